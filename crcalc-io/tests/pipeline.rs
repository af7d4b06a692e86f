#![allow(clippy::float_cmp)]
use crcalc_algorithms::{Hit, ReconstructionConfig, Reconstructor};
use crcalc_core::RECORD_COLUMNS;
use crcalc_io::{scan_hits, write_hits, HitFileReader, MappedFileReader, RecordWriter, RECORD_SIZE};
use tempfile::tempdir;

fn sample_hits() -> Vec<Hit> {
    let mut hits = Vec::new();
    for (id, n) in [(1, 3), (2, 1), (4, 5)] {
        for k in 0..n {
            let z = f64::from(k);
            hits.push(Hit::new(id, 10.0 + z, 20.0 - z, z, 12).with_file_num(17));
        }
    }
    hits
}

#[test]
fn test_csv_hits_to_csv_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("hits.csv");
    let output = dir.path().join("records.csv");
    write_hits(&input, &sample_hits()).unwrap();

    let hits = HitFileReader::open(&input).unwrap().read_hits().unwrap();
    let summary = scan_hits(&hits);
    assert_eq!(summary.events, 3);
    assert_eq!(summary.missing_events, 1);

    let reconstructor = Reconstructor::new(ReconstructionConfig::default()).unwrap();
    let mut writer = RecordWriter::create(&output).unwrap();
    let stats = reconstructor.run(&hits, &mut writer).unwrap();
    assert_eq!(stats.events, 3);
    assert_eq!(stats.missing_events, 1);
    assert_eq!(stats.degenerate, 1);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], RECORD_COLUMNS.join(","));
    // Sentinel plus events 1, 2 and 4.
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("17,0,0,0,"));
    assert!(lines[2].starts_with("17,1,3,36,"));
    assert!(lines[3].starts_with("17,2,1,12,"));
    assert!(lines[4].starts_with("17,4,5,60,"));

    let fields: Vec<f64> = lines[4]
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(fields.len(), RECORD_COLUMNS.len());
    assert_eq!(fields[12], 0.6);
}

#[test]
fn test_binary_hits_to_binary_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("hits.bin");
    let output = dir.path().join("records.dat");
    write_hits(&input, &sample_hits()).unwrap();

    let mapped = MappedFileReader::open(&input).unwrap();
    let hits = mapped.read_hits().unwrap();
    assert_eq!(hits, sample_hits());

    let reconstructor = Reconstructor::new(ReconstructionConfig::new().with_file_num(99)).unwrap();
    let mut writer = RecordWriter::create(&output).unwrap();
    reconstructor.run(&hits, &mut writer).unwrap();

    let data = std::fs::read(&output).unwrap();
    assert_eq!(data.len(), 4 * RECORD_SIZE);
    for record in data.chunks_exact(RECORD_SIZE) {
        assert_eq!(u32::from_le_bytes(record[0..4].try_into().unwrap()), 99);
    }
    let ids: Vec<i64> = data
        .chunks_exact(RECORD_SIZE)
        .map(|r| i64::from_le_bytes(r[4..12].try_into().unwrap()))
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 4]);
}
