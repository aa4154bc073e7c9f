//! Error types for calibration.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Underdetermined system: {required} trials required, {provided} provided")]
    UnderdeterminedSystem { required: usize, provided: usize },

    #[error("Singular system: no usable pivot in column {column}")]
    SingularSystem { column: usize },

    #[error("Invalid trial {index}: {what}")]
    InvalidTrial { index: usize, what: String },

    #[error("Dimension mismatch: {what}")]
    Dimension { what: String },
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;
