//! Builds the calibration system from trials and solves it.

use qs_core::{CHANNEL_COUNT, Coefficients};
use tracing::{debug, warn};

use crate::linear::{DenseSystem, solve_dense};
use crate::{CalibrationError, CalibrationResult, Trial};

/// Solved calibration: per-channel gains plus the additive bias term.
///
/// Only `coefficients` is used for weighing; the live zero reference comes
/// from taring. `bias` is kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSolution {
    pub coefficients: Coefficients,
    pub bias: f64,
}

pub struct CalibrationSolver;

impl CalibrationSolver {
    /// Rows needed for a square system: one per channel gain plus the bias.
    pub const REQUIRED_TRIALS: usize = CHANNEL_COUNT + 1;

    /// Per-channel coefficients for `trials`; the bias term is discarded.
    pub fn solve(trials: &[Trial]) -> CalibrationResult<Coefficients> {
        Self::solve_full(trials).map(|solution| solution.coefficients)
    }

    /// Solve for gains and bias.
    ///
    /// Exactly [`Self::REQUIRED_TRIALS`] rows are used. Extra trials beyond
    /// that are ignored (this is not a least-squares fit).
    pub fn solve_full(trials: &[Trial]) -> CalibrationResult<CalibrationSolution> {
        let required = Self::REQUIRED_TRIALS;
        if trials.len() < required {
            return Err(CalibrationError::UnderdeterminedSystem {
                required,
                provided: trials.len(),
            });
        }
        if trials.len() > required {
            warn!(
                provided = trials.len(),
                used = required,
                "ignoring calibration trials beyond the square system"
            );
        }
        let trials = &trials[..required];

        let mut system = DenseSystem::zeros(required);
        for (index, trial) in trials.iter().enumerate() {
            if !trial.readings.is_finite() {
                return Err(CalibrationError::InvalidTrial {
                    index,
                    what: "non-finite reading".to_string(),
                });
            }
            if !trial.mass.is_finite() {
                return Err(CalibrationError::InvalidTrial {
                    index,
                    what: format!("non-finite mass {}", trial.mass),
                });
            }
            let mut row = [1.0; CHANNEL_COUNT + 1];
            row[..CHANNEL_COUNT].copy_from_slice(trial.readings.as_slice());
            system.set_row(index, &row, trial.mass)?;
        }

        let x = solve_dense(system)?;
        let coefficients = Coefficients::try_from(&x[..CHANNEL_COUNT]).map_err(|e| {
            CalibrationError::Dimension {
                what: e.to_string(),
            }
        })?;
        let bias = x[CHANNEL_COUNT];
        debug!(gains = ?coefficients.gains(), bias, "calibration system solved");

        Ok(CalibrationSolution { coefficients, bias })
    }
}
