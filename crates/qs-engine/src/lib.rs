//! Weighing engine for a four-cell scale.
//!
//! This crate composes the sampling, calibration and storage crates into one
//! value per physical scale. Both the CLI and tests drive the scale through
//! [`WeighingEngine`]:
//!
//! - `instantaneous_weight` / `filtered_weight` for readings
//! - `tare` to zero the platform
//! - `calibrate` to derive and persist new coefficients

pub mod config;
pub mod engine;
pub mod error;
pub mod operator;

pub use config::{EngineConfig, SamplingDef, load_yaml};
pub use engine::{CalibrationReport, ScaleState, TrialRecord, WeighingEngine};
pub use error::{ConfigError, ScaleError, ScaleResult};
pub use operator::{Operator, OperatorError, OperatorPrompt};

pub use qs_sampling::CancelToken;
