//! Linear calibration of a multi-cell scale.
//!
//! A calibration run produces one [`Trial`] per physical placement of a known
//! test mass plus one empty-platform baseline. Each trial contributes one row
//! of the square system
//!
//! ```text
//! [r_0 r_1 ... r_{N-1} 1] · [g_0 ... g_{N-1} β]ᵀ = mass
//! ```
//!
//! which is solved with Gaussian elimination (partial pivoting). The gains
//! `g` become the scale's coefficients; the bias `β` is reported separately.

pub mod error;
pub mod linear;
pub mod solver;
pub mod trial;

pub use error::{CalibrationError, CalibrationResult};
pub use linear::{DenseSystem, SINGULAR_PIVOT_RATIO, solve_dense};
pub use solver::{CalibrationSolution, CalibrationSolver};
pub use trial::Trial;
