//! Error types for sampling operations.

use qs_core::Channel;
use qs_device::DeviceError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Cannot aggregate an empty sample set")]
    EmptyInput,

    #[error("Sampling failed on {channel}: {source}")]
    ChannelReadFailure {
        channel: Channel,
        #[source]
        source: DeviceError,
    },

    #[error("Sampling cancelled")]
    Cancelled,
}

pub type SamplingResult<T> = Result<T, SamplingError>;

impl SamplingError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        SamplingError::InvalidParameter { what: what.into() }
    }
}
