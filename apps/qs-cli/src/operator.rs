//! Terminal operator for calibration on the bench simulator.

use std::io::{self, BufRead, Write};

use qs_core::Channel;
use qs_device::{LoadPosition, SimulatedScale};
use qs_engine::{Operator, OperatorError, OperatorPrompt};

/// Asks for Enter on stdin before each trial, then moves the simulated mass
/// to where a person would have put it.
pub struct BenchOperator {
    sim: SimulatedScale,
    interactive: bool,
}

impl BenchOperator {
    pub fn new(sim: SimulatedScale, interactive: bool) -> Self {
        Self { sim, interactive }
    }

    fn wait_for_enter(&self, prompt: &OperatorPrompt) -> Result<(), OperatorError> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}, then press Enter (q to abort): ").map_err(interaction)?;
        stdout.flush().map_err(interaction)?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line).map_err(interaction)?;
        if read == 0 || line.trim().eq_ignore_ascii_case("q") {
            return Err(OperatorError::Declined);
        }
        Ok(())
    }
}

fn interaction(e: io::Error) -> OperatorError {
    OperatorError::Interaction {
        message: e.to_string(),
    }
}

impl Operator for BenchOperator {
    fn confirm(&mut self, prompt: &OperatorPrompt) -> Result<(), OperatorError> {
        if self.interactive {
            self.wait_for_enter(prompt)?;
        } else {
            println!("{prompt}");
        }

        match *prompt {
            OperatorPrompt::PlaceMass {
                placement, mass, ..
            } => {
                let channel = placement
                    .checked_sub(1)
                    .and_then(|index| Channel::new(index).ok())
                    .ok_or_else(|| OperatorError::Interaction {
                        message: format!("no cell for placement {placement}"),
                    })?;
                self.sim.place(mass, LoadPosition::Corner(channel));
            }
            OperatorPrompt::RemoveMass => self.sim.clear(),
        }
        Ok(())
    }
}
