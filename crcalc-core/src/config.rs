//! Reconstruction configuration.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings for the Levenberg-Marquardt line fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// Finite-difference step per parameter for the Jacobian.
    pub step_size: f64,
    /// Maximum number of accepted-or-rejected iterations.
    pub max_iterations: usize,
    /// Relative decrease of the objective below which the fit has converged.
    pub ftol: f64,
    /// Relative step length below which the fit has converged.
    pub xtol: f64,
    /// Gradient magnitude below which the fit has converged.
    pub gtol: f64,
    /// Starting damping factor.
    pub initial_lambda: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            max_iterations: 1000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
            initial_lambda: 1e-3,
        }
    }
}

impl FitConfig {
    /// Sets the finite-difference step size.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Sets the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("step_size", self.step_size),
            ("ftol", self.ftol),
            ("xtol", self.xtol),
            ("gtol", self.gtol),
            ("initial_lambda", self.initial_lambda),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a reconstruction run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconstructionConfig {
    /// File number written to every record. Taken from the first hit when unset.
    pub file_num: Option<u32>,
    /// Line fit settings.
    pub fit: FitConfig,
    /// Process the events of a batch in parallel.
    pub parallel: bool,
    /// Number of events materialized per batch.
    pub batch_events: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            file_num: None,
            fit: FitConfig::default(),
            parallel: true,
            batch_events: 4096,
        }
    }
}

impl ReconstructionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output file number.
    #[must_use]
    pub fn with_file_num(mut self, file_num: u32) -> Self {
        self.file_num = Some(file_num);
        self
    }

    /// Sets the line fit settings.
    #[must_use]
    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    /// Enables or disables parallel event processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_events(mut self, batch_events: usize) -> Self {
        self.batch_events = batch_events;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.batch_events == 0 {
            return Err(Error::InvalidConfig(
                "batch_events must be at least 1".to_string(),
            ));
        }
        self.fit.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconstructionConfig::new();
        assert!(config.validate().is_ok());
        assert!((config.fit.step_size - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.file_num, None);
    }

    #[test]
    fn test_builder() {
        let config = ReconstructionConfig::new()
            .with_file_num(101)
            .with_parallel(false)
            .with_batch_events(16)
            .with_fit(FitConfig::default().with_max_iterations(50));

        assert_eq!(config.file_num, Some(101));
        assert!(!config.parallel);
        assert_eq!(config.batch_events, 16);
        assert_eq!(config.fit.max_iterations, 50);
    }

    #[test]
    fn test_invalid_settings() {
        let zero_batch = ReconstructionConfig::new().with_batch_events(0);
        assert!(matches!(zero_batch.validate(), Err(Error::InvalidConfig(_))));

        let bad_step = FitConfig::default().with_step_size(-0.1);
        assert!(bad_step.validate().is_err());

        let nan_step = FitConfig::default().with_step_size(f64::NAN);
        assert!(nan_step.validate().is_err());

        let no_iterations = FitConfig::default().with_max_iterations(0);
        assert!(no_iterations.validate().is_err());
    }
}
