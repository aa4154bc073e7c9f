use core::fmt;
use core::str::FromStr;

use crate::CoreError;

/// Number of load-cell inputs on the acquisition device.
pub const CHANNEL_COUNT: usize = 4;

/// Index of one load-cell input line, always in `0..CHANNEL_COUNT`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct Channel(u8);

impl Channel {
    /// Every channel of the device, in channel order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel(0), Channel(1), Channel(2), Channel(3)];

    pub fn new(index: usize) -> Result<Self, CoreError> {
        if index < CHANNEL_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(CoreError::InvalidArg {
                what: format!("channel {index} (device has {CHANNEL_COUNT} channels)"),
            })
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for Channel {
    type Error = CoreError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<Channel> for usize {
    fn from(channel: Channel) -> Self {
        channel.index()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Serial number of an acquisition device; keys persisted coefficients.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceSerial(pub u32);

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceSerial {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DeviceSerial)
            .map_err(|_| CoreError::InvalidArg {
                what: format!("device serial {s:?}"),
            })
    }
}
