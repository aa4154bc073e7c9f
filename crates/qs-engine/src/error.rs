//! Error types for the engine layer.

use qs_calibration::CalibrationError;
use qs_device::DeviceError;
use qs_sampling::SamplingError;
use qs_store::StoreError;

use crate::operator::OperatorError;

/// Errors reading or validating engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {what}")]
    Invalid { what: String },
}

/// Every failure a top-level scale operation can surface.
///
/// Variants wrapping lower-layer errors keep that error as their source.
#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("Scale is not calibrated")]
    NotCalibrated,

    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Attachment failure: {0}")]
    AttachmentFailure(#[source] DeviceError),

    #[error("Read failure: {0}")]
    ReadFailure(#[source] DeviceError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Sampling error: {0}")]
    Sampling(#[source] SamplingError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operator error: {0}")]
    Operator(#[source] OperatorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type ScaleResult<T> = Result<T, ScaleError>;

impl From<SamplingError> for ScaleError {
    fn from(err: SamplingError) -> Self {
        match err {
            SamplingError::Cancelled => ScaleError::Cancelled,
            SamplingError::InvalidParameter { what } => ScaleError::InvalidParameter { what },
            other => ScaleError::Sampling(other),
        }
    }
}

impl From<OperatorError> for ScaleError {
    fn from(err: OperatorError) -> Self {
        match err {
            OperatorError::Declined => ScaleError::Cancelled,
            other => ScaleError::Operator(other),
        }
    }
}
