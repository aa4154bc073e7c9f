//! Per-channel gains and per-channel readings.
//!
//! Both types are fixed at [`CHANNEL_COUNT`] entries so a length mismatch can
//! only happen at the boundary where untyped data (a slice, a CSV row) is
//! converted.

use crate::ids::{CHANNEL_COUNT, Channel};
use crate::numeric::{Real, dot, ensure_finite};
use crate::{CoreError, CoreResult};

/// Linear gains mapping each channel's voltage ratio to weight units.
///
/// Every gain is finite. There is no default: a scale without coefficients is
/// uncalibrated, not calibrated to zero.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<Real>", into = "Vec<Real>"))]
pub struct Coefficients([Real; CHANNEL_COUNT]);

impl Coefficients {
    pub fn new(gains: [Real; CHANNEL_COUNT]) -> CoreResult<Self> {
        for gain in gains {
            ensure_finite(gain, "coefficient")?;
        }
        Ok(Self(gains))
    }

    pub fn gains(&self) -> &[Real; CHANNEL_COUNT] {
        &self.0
    }

    pub fn gain(&self, channel: Channel) -> Real {
        self.0[channel.index()]
    }

    /// Uncorrected weight for a set of readings (no tare offset applied).
    pub fn weigh(&self, readings: &ChannelReadings) -> Real {
        dot(&self.0, readings.as_slice())
    }
}

impl TryFrom<&[Real]> for Coefficients {
    type Error = CoreError;

    fn try_from(values: &[Real]) -> Result<Self, Self::Error> {
        let gains: [Real; CHANNEL_COUNT] =
            values.try_into().map_err(|_| CoreError::LengthMismatch {
                what: "coefficients",
                expected: CHANNEL_COUNT,
                actual: values.len(),
            })?;
        Self::new(gains)
    }
}

impl TryFrom<Vec<Real>> for Coefficients {
    type Error = CoreError;

    fn try_from(values: Vec<Real>) -> Result<Self, Self::Error> {
        Self::try_from(values.as_slice())
    }
}

impl From<Coefficients> for Vec<Real> {
    fn from(c: Coefficients) -> Self {
        c.0.to_vec()
    }
}

/// One robust scalar per channel, in channel order.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelReadings([Real; CHANNEL_COUNT]);

impl ChannelReadings {
    pub fn new(values: [Real; CHANNEL_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, channel: Channel) -> Real {
        self.0[channel.index()]
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn dot(&self, coefficients: &Coefficients) -> Real {
        coefficients.weigh(self)
    }
}

impl TryFrom<&[Real]> for ChannelReadings {
    type Error = CoreError;

    fn try_from(values: &[Real]) -> Result<Self, Self::Error> {
        let values: [Real; CHANNEL_COUNT] =
            values.try_into().map_err(|_| CoreError::LengthMismatch {
                what: "channel readings",
                expected: CHANNEL_COUNT,
                actual: values.len(),
            })?;
        Ok(Self(values))
    }
}
