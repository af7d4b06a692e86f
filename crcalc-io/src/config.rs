//! JSON configuration files.
//!
//! Every section and key is optional; missing values keep their defaults.
//!
//! ```json
//! {
//!   "file_num": 12,
//!   "parallel": true,
//!   "batch_events": 4096,
//!   "fit": { "step_size": 0.01, "max_iterations": 1000 }
//! }
//! ```

use crate::Result;
use crcalc_core::{FitConfig, ReconstructionConfig};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JsonConfig {
    file_num: Option<u32>,
    parallel: bool,
    batch_events: usize,
    fit: JsonFit,
}

impl Default for JsonConfig {
    fn default() -> Self {
        let defaults = ReconstructionConfig::default();
        Self {
            file_num: defaults.file_num,
            parallel: defaults.parallel,
            batch_events: defaults.batch_events,
            fit: JsonFit::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JsonFit {
    step_size: f64,
    max_iterations: usize,
    ftol: f64,
    xtol: f64,
    gtol: f64,
    initial_lambda: f64,
}

impl Default for JsonFit {
    fn default() -> Self {
        let defaults = FitConfig::default();
        Self {
            step_size: defaults.step_size,
            max_iterations: defaults.max_iterations,
            ftol: defaults.ftol,
            xtol: defaults.xtol,
            gtol: defaults.gtol,
            initial_lambda: defaults.initial_lambda,
        }
    }
}

impl From<JsonConfig> for ReconstructionConfig {
    fn from(json: JsonConfig) -> Self {
        let fit = FitConfig {
            step_size: json.fit.step_size,
            max_iterations: json.fit.max_iterations,
            ftol: json.fit.ftol,
            xtol: json.fit.xtol,
            gtol: json.fit.gtol,
            initial_lambda: json.fit.initial_lambda,
        };
        Self {
            file_num: json.file_num,
            fit,
            parallel: json.parallel,
            batch_events: json.batch_events,
        }
    }
}

/// Loads a configuration from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if the
/// resulting configuration is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ReconstructionConfig> {
    let reader = BufReader::new(File::open(path)?);
    let json: JsonConfig = serde_json::from_reader(reader)?;
    finish(json)
}

/// Parses a configuration from a JSON string.
///
/// # Errors
/// Returns an error if the string cannot be parsed or the resulting
/// configuration is invalid.
pub fn config_from_json(json: &str) -> Result<ReconstructionConfig> {
    let json: JsonConfig = serde_json::from_str(json)?;
    finish(json)
}

fn finish(json: JsonConfig) -> Result<ReconstructionConfig> {
    let config = ReconstructionConfig::from(json);
    config.validate()?;
    Ok(config)
}
