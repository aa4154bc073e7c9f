//! Operator synchronization points during calibration.

use std::fmt;

/// What the operator is asked to do before the next calibration trial.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorPrompt {
    /// Put (or move) the test mass onto placement `placement` of `placements`.
    PlaceMass {
        placement: usize,
        placements: usize,
        mass: f64,
    },
    /// Take the test mass off for the empty-platform trial.
    RemoveMass,
}

impl fmt::Display for OperatorPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorPrompt::PlaceMass {
                placement,
                placements,
                mass,
            } => write!(
                f,
                "Place/move the {mass} test mass to position {placement} of {placements}"
            ),
            OperatorPrompt::RemoveMass => write!(f, "Remove the test mass"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("Operator declined to continue")]
    Declined,

    #[error("Operator interaction failed: {message}")]
    Interaction { message: String },
}

/// Blocks until the operator confirms a prompt.
///
/// The engine does not start the next trial until `confirm` returns `Ok`.
pub trait Operator {
    fn confirm(&mut self, prompt: &OperatorPrompt) -> Result<(), OperatorError>;
}

impl<F> Operator for F
where
    F: FnMut(&OperatorPrompt) -> Result<(), OperatorError>,
{
    fn confirm(&mut self, prompt: &OperatorPrompt) -> Result<(), OperatorError> {
        self(prompt)
    }
}
