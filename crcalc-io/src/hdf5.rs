//! HDF5 hit input and event record output.
//!
//! Hits live in a group `hits` with one 1-D dataset per column. Records are
//! written to a group `crcalc` as extendable, chunked datasets named after
//! the output columns, appended in buffered blocks.

use crate::{Error, Result};
use crcalc_core::{EventRecord, Hit, RECORD_COLUMNS};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use std::path::Path;
use std::str::FromStr;

const HITS_GROUP: &str = "hits";
const RECORDS_GROUP: &str = "crcalc";
const CHUNK_RECORDS: usize = 8192;
const FORMAT_VERSION: &str = "0.3";

/// Reads all hits from the `hits` group of `path`.
///
/// `event_number` and `relative_BCID` are optional and read as zero when absent.
///
/// # Errors
/// Returns an error if a required dataset is missing or the columns differ
/// in length.
pub fn read_hits_hdf5<P: AsRef<Path>>(path: P) -> Result<Vec<Hit>> {
    let file = File::open(path)?;
    let group = file.group(HITS_GROUP)?;

    let file_num: Vec<u32> = read_dataset_vec(&group, "h5_file_num")?;
    let tot: Vec<u8> = read_dataset_vec(&group, "tot")?;
    let sm_event_num: Vec<i64> = read_dataset_vec(&group, "SM_event_num")?;
    let x: Vec<f64> = read_dataset_vec(&group, "x")?;
    let y: Vec<f64> = read_dataset_vec(&group, "y")?;
    let z: Vec<f64> = read_dataset_vec(&group, "z")?;
    let n = sm_event_num.len();
    let event_number: Vec<i64> =
        read_dataset_vec_opt(&group, "event_number")?.unwrap_or_else(|| vec![0; n]);
    let relative_bcid: Vec<u8> =
        read_dataset_vec_opt(&group, "relative_BCID")?.unwrap_or_else(|| vec![0; n]);

    let lengths = [
        file_num.len(),
        event_number.len(),
        tot.len(),
        relative_bcid.len(),
        x.len(),
        y.len(),
        z.len(),
    ];
    if lengths.iter().any(|&len| len != n) {
        return Err(Error::InvalidFormat(format!(
            "hit datasets differ in length: SM_event_num has {n}, others {lengths:?}"
        )));
    }

    Ok((0..n)
        .map(|i| Hit {
            file_num: file_num[i],
            event_number: event_number[i],
            tot: tot[i],
            relative_bcid: relative_bcid[i],
            sm_event_num: sm_event_num[i],
            x: x[i],
            y: y[i],
            z: z[i],
        })
        .collect())
}

/// Writes hits to the `hits` group of a new file at `path`.
///
/// # Errors
/// Returns an error if the file or datasets cannot be created.
pub fn write_hits_hdf5<P: AsRef<Path>>(path: P, hits: &[Hit]) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "crcalc_format_version", FORMAT_VERSION)?;
    let group = file.create_group(HITS_GROUP)?;

    write_column(&group, "h5_file_num", hits, |h| h.file_num)?;
    write_column(&group, "event_number", hits, |h| h.event_number)?;
    write_column(&group, "tot", hits, |h| h.tot)?;
    write_column(&group, "relative_BCID", hits, |h| h.relative_bcid)?;
    write_column(&group, "SM_event_num", hits, |h| h.sm_event_num)?;
    write_column(&group, "x", hits, |h| h.x)?;
    write_column(&group, "y", hits, |h| h.y)?;
    write_column(&group, "z", hits, |h| h.z)?;
    Ok(())
}

fn write_column<T, F>(group: &Group, name: &str, hits: &[Hit], get: F) -> Result<()>
where
    T: H5Type,
    F: Fn(&Hit) -> T,
{
    let values: Vec<T> = hits.iter().map(get).collect();
    let dataset = create_extendable_dataset::<T>(group, name)?;
    append_slice(&dataset, 0, &values)
}

/// Column buffers for pending records.
#[derive(Default)]
struct RecordColumns {
    file_num: Vec<u32>,
    sm_event_num: Vec<i64>,
    num_hits: Vec<u32>,
    sum_tots: Vec<u32>,
    floats: [Vec<f64>; 9],
}

impl RecordColumns {
    fn push(&mut self, r: &EventRecord) {
        self.file_num.push(r.file_num);
        self.sm_event_num.push(r.sm_event_num);
        self.num_hits.push(r.num_hits);
        self.sum_tots.push(r.sum_tots);
        let [p0, p1, p2, p3] = r.line_fit_params;
        let values = [
            r.mean_x,
            r.mean_y,
            r.mean_z,
            p0,
            p1,
            p2,
            p3,
            r.sum_of_squares,
            r.fraction_inside_sphere,
        ];
        for (column, value) in self.floats.iter_mut().zip(values) {
            column.push(value);
        }
    }

    fn len(&self) -> usize {
        self.sm_event_num.len()
    }

    fn clear(&mut self) {
        self.file_num.clear();
        self.sm_event_num.clear();
        self.num_hits.clear();
        self.sum_tots.clear();
        for column in &mut self.floats {
            column.clear();
        }
    }
}

/// Streaming writer for event records.
pub struct Hdf5RecordSink {
    _file: File,
    file_num: Dataset,
    sm_event_num: Dataset,
    num_hits: Dataset,
    sum_tots: Dataset,
    floats: Vec<Dataset>,
    pending: RecordColumns,
    written: usize,
}

impl Hdf5RecordSink {
    /// Creates the file and the empty record datasets.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file or datasets cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        set_attr_str_file(&file, "crcalc_format_version", FORMAT_VERSION)?;
        let group = file.create_group(RECORDS_GROUP)?;
        set_attr_str_group(&group, "columns", &RECORD_COLUMNS.join(","))?;

        let file_num = create_extendable_dataset::<u32>(&group, RECORD_COLUMNS[0])?;
        let sm_event_num = create_extendable_dataset::<i64>(&group, RECORD_COLUMNS[1])?;
        let num_hits = create_extendable_dataset::<u32>(&group, RECORD_COLUMNS[2])?;
        let sum_tots = create_extendable_dataset::<u32>(&group, RECORD_COLUMNS[3])?;
        let floats = RECORD_COLUMNS[4..]
            .iter()
            .map(|name| create_extendable_dataset::<f64>(&group, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            _file: file,
            file_num,
            sm_event_num,
            num_hits,
            sum_tots,
            floats,
            pending: RecordColumns::default(),
            written: 0,
        })
    }

    /// Buffers one record, writing a block once the buffer is full.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write(&mut self, record: &EventRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= CHUNK_RECORDS {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes buffered records.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn flush(&mut self) -> Result<()> {
        let offset = self.written;
        let p = &self.pending;
        append_slice(&self.file_num, offset, &p.file_num)?;
        append_slice(&self.sm_event_num, offset, &p.sm_event_num)?;
        append_slice(&self.num_hits, offset, &p.num_hits)?;
        append_slice(&self.sum_tots, offset, &p.sum_tots)?;
        for (dataset, column) in self.floats.iter().zip(&p.floats) {
            append_slice(dataset, offset, column)?;
        }
        self.written += p.len();
        self.pending.clear();
        Ok(())
    }

    /// Records written to the file so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }
}

fn create_extendable_dataset<T: H5Type>(group: &Group, name: &str) -> Result<Dataset> {
    Ok(group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((CHUNK_RECORDS,))
        .deflate(1)
        .shuffle()
        .create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn read_dataset_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crcalc_core::RecordSink;
    use tempfile::Builder;

    #[test]
    fn test_hits_round_trip() {
        let file = Builder::new().suffix(".h5").tempfile().unwrap();
        let hits = vec![
            Hit::new(1, 0.5, 1.5, 2.5, 10).with_file_num(2),
            Hit::new(2, -3.0, 4.0, 5.0, 20).with_file_num(2),
        ];
        write_hits_hdf5(file.path(), &hits).unwrap();
        let read = read_hits_hdf5(file.path()).unwrap();
        assert_eq!(read, hits);
    }

    #[test]
    fn test_record_sink_appends_columns() {
        let file = Builder::new().suffix(".h5").tempfile().unwrap();
        {
            let mut sink = crate::RecordWriter::create(file.path()).unwrap();
            sink.append(&EventRecord::sentinel(2)).unwrap();
            let mut record = EventRecord::sentinel(2);
            record.sm_event_num = 1;
            record.num_hits = 4;
            record.fraction_inside_sphere = 0.5;
            sink.append(&record).unwrap();
            sink.finish().unwrap();
        }

        let h5 = File::open(file.path()).unwrap();
        let group = h5.group(RECORDS_GROUP).unwrap();
        let ids: Vec<i64> = read_dataset_vec(&group, "SM_event_num").unwrap();
        let hits: Vec<u32> = read_dataset_vec(&group, "num_hits").unwrap();
        let fraction: Vec<f64> = read_dataset_vec(&group, "fraction_inside_sphere").unwrap();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(hits, vec![0, 4]);
        assert_eq!(fraction, vec![0.0, 0.5]);
    }
}
