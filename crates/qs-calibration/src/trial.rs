use qs_core::ChannelReadings;

/// One calibration observation: robust per-channel readings under a known
/// applied mass. The empty-platform baseline has `mass == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub readings: ChannelReadings,
    pub mass: f64,
}

impl Trial {
    pub fn new(readings: ChannelReadings, mass: f64) -> Self {
        Self { readings, mass }
    }

    pub fn baseline(readings: ChannelReadings) -> Self {
        Self::new(readings, 0.0)
    }
}
