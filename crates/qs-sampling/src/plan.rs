//! Sampling protocol: how many reads, how fast, how they are reduced.

use std::time::Duration;

use crate::{AggregationMode, SamplingError, SamplingResult};

/// A validated sampling protocol.
///
/// Construction checks every parameter, so a `SamplePlan` that exists is
/// always runnable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePlan {
    samples_per_channel: usize,
    sample_rate_hz: f64,
    interval: Duration,
    mode: AggregationMode,
}

impl SamplePlan {
    /// Create a median-aggregated plan.
    ///
    /// # Arguments
    ///
    /// * `samples_per_channel` - Reads per channel (must be positive)
    /// * `sample_rate_hz` - Read frequency in Hz (must be positive and finite)
    pub fn new(samples_per_channel: usize, sample_rate_hz: f64) -> SamplingResult<Self> {
        if samples_per_channel == 0 {
            return Err(SamplingError::invalid("samples per channel must be positive"));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(SamplingError::invalid(format!(
                "sample rate {sample_rate_hz} Hz must be positive"
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / sample_rate_hz).map_err(|_| {
            SamplingError::invalid(format!(
                "sample rate {sample_rate_hz} Hz has no representable period"
            ))
        })?;
        Ok(Self {
            samples_per_channel,
            sample_rate_hz,
            interval,
            mode: AggregationMode::Median,
        })
    }

    pub fn with_mode(mut self, mode: AggregationMode) -> SamplingResult<Self> {
        mode.validate()?;
        self.mode = mode;
        Ok(self)
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Pause between consecutive reads of one channel.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Wall-clock length of one window (no sleep after the final read).
    ///
    /// Saturates at `Duration::MAX` for windows too long to represent.
    pub fn window(&self) -> Duration {
        let pauses = u32::try_from(self.samples_per_channel - 1).unwrap_or(u32::MAX);
        self.interval.saturating_mul(pauses)
    }
}
