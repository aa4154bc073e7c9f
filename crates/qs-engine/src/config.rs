//! Engine configuration.
//!
//! Every field has a default, so a YAML file only needs to list what it
//! changes:
//!
//! ```yaml
//! default_offset: 0.0
//! calibration:
//!   samples_per_channel: 250
//! ```

use std::path::Path;

use qs_sampling::{SamplePlan, SamplingResult};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One sampling protocol as written in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingDef {
    pub samples_per_channel: usize,
    pub sample_rate_hz: f64,
}

impl SamplingDef {
    pub fn new(samples_per_channel: usize, sample_rate_hz: f64) -> Self {
        Self {
            samples_per_channel,
            sample_rate_hz,
        }
    }

    pub fn plan(&self) -> SamplingResult<SamplePlan> {
        SamplePlan::new(self.samples_per_channel, self.sample_rate_hz)
    }
}

impl Default for SamplingDef {
    fn default() -> Self {
        Self::new(100, 50.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Offset used until the first tare and after every calibration.
    pub default_offset: f64,
    /// Known mass used for calibration trials.
    pub test_mass: f64,
    /// How long to wait for each channel to attach.
    pub attach_timeout_ms: u64,
    /// Protocol for `tare` and filtered weighing.
    pub filtered: SamplingDef,
    /// Protocol for each calibration trial.
    pub calibration: SamplingDef,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_offset: 4122.65,
            test_mass: 393.8,
            attach_timeout_ms: 2000,
            filtered: SamplingDef::new(100, 50.0),
            calibration: SamplingDef::new(1000, 50.0),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_offset.is_finite() {
            return Err(invalid(format!(
                "default_offset must be finite, got {}",
                self.default_offset
            )));
        }
        if !(self.test_mass.is_finite() && self.test_mass > 0.0) {
            return Err(invalid(format!(
                "test_mass must be positive, got {}",
                self.test_mass
            )));
        }
        for (name, def) in [("filtered", &self.filtered), ("calibration", &self.calibration)] {
            def.plan()
                .map_err(|e| invalid(format!("{name} sampling: {e}")))?;
        }
        Ok(())
    }
}

fn invalid(what: String) -> ConfigError {
    ConfigError::Invalid { what }
}

pub fn load_yaml(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_protocol() {
        let config = EngineConfig::default();
        assert_eq!(config.calibration.samples_per_channel, 1000);
        assert_eq!(config.calibration.sample_rate_hz, 50.0);
        assert_eq!(config.test_mass, 393.8);
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "default_offset: 0.0\ncalibration:\n  samples_per_channel: 250\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_offset, 0.0);
        assert_eq!(config.calibration.samples_per_channel, 250);
        assert_eq!(config.calibration.sample_rate_hz, 50.0);
        assert_eq!(config.filtered, SamplingDef::default());
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.filtered.sample_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.test_mass = -1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.default_offset = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_yaml_from_disk() {
        let dir = std::env::temp_dir().join("qs_engine_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scale.yaml");
        std::fs::write(&path, "test_mass: 500.0\nfiltered:\n  sample_rate_hz: 25.0\n").unwrap();

        let config = load_yaml(&path).unwrap();
        assert_eq!(config.test_mass, 500.0);
        assert_eq!(config.filtered.sample_rate_hz, 25.0);
        assert_eq!(config.filtered.samples_per_channel, 100);

        std::fs::write(&path, "calibration:\n  samples_per_channel: 0\n").unwrap();
        assert!(matches!(load_yaml(&path), Err(ConfigError::Invalid { .. })));
    }
}
