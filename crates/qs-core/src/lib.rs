//! qs-core: shared foundation for the quadscale workspace.
//!
//! Contains:
//! - ids (channel indices and device serial numbers)
//! - coefficients (per-channel gains and per-channel readings)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod coefficients;
pub mod error;
pub mod ids;
pub mod numeric;

pub use coefficients::{ChannelReadings, Coefficients};
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
