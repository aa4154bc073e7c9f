//! Bench simulator for a four-cell platform.
//!
//! Each cell is modeled as a linear bridge:
//!
//! ```text
//! ratio_c = zero_ratio_c + ratio_per_unit_c * mass * share_c + noise
//! ```
//!
//! where `share_c` is the fraction of the load carried by cell `c` for the
//! current [`LoadPosition`] (shares sum to 1). The true weight is therefore
//! `Σ (ratio_c - zero_ratio_c) / ratio_per_unit_c`, which is exactly the form
//! the calibration solver fits.
//!
//! [`SimulatedScale`] is a cheap handle: clones share the same platform, so a
//! test operator can move the load while the engine owns the reader.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use qs_core::{CHANNEL_COUNT, Channel, DeviceSerial};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use crate::{ChannelReader, DeviceError, DeviceResult};

/// Share of the load carried by the cell a corner placement sits on.
const CORNER_SHARE: f64 = 0.7;

/// Fastest data interval the simulated device reports.
const MIN_INTERVAL: Duration = Duration::from_millis(8);

/// Static characteristics of one simulated load cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellModel {
    /// Ratio reported with nothing on the platform.
    pub zero_ratio: f64,
    /// Ratio change per unit of mass carried by this cell.
    pub ratio_per_unit: f64,
}

/// Where the load sits on the platform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadPosition {
    /// Evenly spread over all cells.
    Center,
    /// Mostly over one cell, the rest spread over the others.
    Corner(Channel),
    /// Explicit per-cell shares; normalized before use.
    Shares([f64; CHANNEL_COUNT]),
}

impl LoadPosition {
    fn shares(self) -> [f64; CHANNEL_COUNT] {
        match self {
            LoadPosition::Center => [1.0 / CHANNEL_COUNT as f64; CHANNEL_COUNT],
            LoadPosition::Corner(channel) => {
                let rest = (1.0 - CORNER_SHARE) / (CHANNEL_COUNT - 1) as f64;
                let mut shares = [rest; CHANNEL_COUNT];
                shares[channel.index()] = CORNER_SHARE;
                shares
            }
            LoadPosition::Shares(raw) => {
                let total: f64 = raw.iter().sum();
                if total.abs() < f64::EPSILON {
                    return [0.0; CHANNEL_COUNT];
                }
                raw.map(|s| s / total)
            }
        }
    }
}

struct Platform {
    mass: f64,
    shares: [f64; CHANNEL_COUNT],
    attached: [bool; CHANNEL_COUNT],
    intervals: [Duration; CHANNEL_COUNT],
    unplugged: bool,
    rng: StdRng,
    noise: Option<Normal<f64>>,
}

struct Shared {
    cells: [CellModel; CHANNEL_COUNT],
    platform: Mutex<Platform>,
}

#[derive(Clone)]
pub struct SimulatedScale {
    shared: Arc<Shared>,
}

impl SimulatedScale {
    pub fn new(cells: [CellModel; CHANNEL_COUNT]) -> Self {
        Self {
            shared: Arc::new(Shared {
                cells,
                platform: Mutex::new(Platform {
                    mass: 0.0,
                    shares: [0.0; CHANNEL_COUNT],
                    attached: [false; CHANNEL_COUNT],
                    intervals: [MIN_INTERVAL; CHANNEL_COUNT],
                    unplugged: false,
                    rng: StdRng::seed_from_u64(0),
                    noise: None,
                }),
            }),
        }
    }

    /// A platform with four slightly mismatched cells, roughly 2 mV/V at 10 kg.
    pub fn bench() -> Self {
        Self::new([
            CellModel {
                zero_ratio: 1.2e-4,
                ratio_per_unit: 2.00e-7,
            },
            CellModel {
                zero_ratio: -0.8e-4,
                ratio_per_unit: 2.10e-7,
            },
            CellModel {
                zero_ratio: 2.1e-4,
                ratio_per_unit: 1.90e-7,
            },
            CellModel {
                zero_ratio: 0.5e-4,
                ratio_per_unit: 2.05e-7,
            },
        ])
    }

    /// Add zero-mean Gaussian noise with standard deviation `sigma` (in ratio
    /// units) to every read, from a deterministic `seed`.
    pub fn with_noise(self, sigma: f64, seed: u64) -> DeviceResult<Self> {
        let normal = Normal::new(0.0, sigma).map_err(|e| DeviceError::Read {
            channel: Channel::ALL[0],
            message: format!("Noise distribution error: {e}"),
        })?;
        {
            let mut platform = self.platform();
            platform.noise = Some(normal);
            platform.rng = StdRng::seed_from_u64(seed);
        }
        Ok(self)
    }

    pub fn cells(&self) -> &[CellModel; CHANNEL_COUNT] {
        &self.shared.cells
    }

    pub fn place(&self, mass: f64, position: LoadPosition) {
        let mut platform = self.platform();
        platform.mass = mass;
        platform.shares = position.shares();
        debug!(mass, ?position, "simulated load placed");
    }

    pub fn clear(&self) {
        let mut platform = self.platform();
        platform.mass = 0.0;
        platform.shares = [0.0; CHANNEL_COUNT];
    }

    /// Simulate pulling the USB cable: every later open or read fails.
    pub fn set_unplugged(&self, unplugged: bool) {
        self.platform().unplugged = unplugged;
    }

    pub fn sample_interval(&self, channel: Channel) -> Duration {
        self.platform().intervals[channel.index()]
    }

    fn platform(&self) -> MutexGuard<'_, Platform> {
        self.shared
            .platform
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelReader for SimulatedScale {
    fn open(
        &mut self,
        serial: DeviceSerial,
        channel: Channel,
        _timeout: Duration,
    ) -> DeviceResult<()> {
        let mut platform = self.platform();
        if platform.unplugged {
            return Err(DeviceError::Attachment {
                serial,
                channel,
                message: "device not present".to_string(),
            });
        }
        platform.attached[channel.index()] = true;
        Ok(())
    }

    fn min_sample_interval(&self, _channel: Channel) -> DeviceResult<Duration> {
        Ok(MIN_INTERVAL)
    }

    fn set_sample_interval(&mut self, channel: Channel, interval: Duration) -> DeviceResult<()> {
        if interval < MIN_INTERVAL {
            return Err(DeviceError::Read {
                channel,
                message: format!("interval {interval:?} below minimum {MIN_INTERVAL:?}"),
            });
        }
        self.platform().intervals[channel.index()] = interval;
        Ok(())
    }

    fn read_ratio(&self, channel: Channel) -> DeviceResult<f64> {
        let cell = self.shared.cells[channel.index()];
        let mut guard = self.platform();
        let platform = &mut *guard;
        if platform.unplugged || !platform.attached[channel.index()] {
            return Err(DeviceError::Read {
                channel,
                message: "channel not attached".to_string(),
            });
        }
        let load = platform.mass * platform.shares[channel.index()];
        let noise = match platform.noise {
            Some(normal) => normal.sample(&mut platform.rng),
            None => 0.0,
        };
        Ok(cell.zero_ratio + cell.ratio_per_unit * load + noise)
    }
}
