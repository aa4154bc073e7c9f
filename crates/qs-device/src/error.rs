//! Error types for device access.

use qs_core::{Channel, DeviceSerial};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device or channel could not be reached.
    #[error("Attachment failure on {channel} of device {serial}: {message}")]
    Attachment {
        serial: DeviceSerial,
        channel: Channel,
        message: String,
    },

    /// A single read failed on an attached channel.
    #[error("Read failure on {channel}: {message}")]
    Read { channel: Channel, message: String },
}

impl DeviceError {
    pub fn channel(&self) -> Channel {
        match self {
            DeviceError::Attachment { channel, .. } | DeviceError::Read { channel, .. } => *channel,
        }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
