use std::time::Duration;

use qs_core::{Channel, DeviceSerial};

use crate::DeviceResult;

/// A multi-channel voltage-ratio input device.
///
/// `read_ratio` takes `&self` and the trait requires `Sync` so that one
/// sampling task per channel can read concurrently from a shared reference.
/// Configuration calls take `&mut self` and happen before sampling starts.
pub trait ChannelReader: Sync {
    /// Attach to `channel` of the device identified by `serial`, waiting at
    /// most `timeout`.
    fn open(&mut self, serial: DeviceSerial, channel: Channel, timeout: Duration)
    -> DeviceResult<()>;

    /// Fastest data interval the channel supports.
    fn min_sample_interval(&self, channel: Channel) -> DeviceResult<Duration>;

    fn set_sample_interval(&mut self, channel: Channel, interval: Duration) -> DeviceResult<()>;

    /// Latest voltage ratio on `channel`. Fails if the channel is not attached.
    fn read_ratio(&self, channel: Channel) -> DeviceResult<f64>;
}
