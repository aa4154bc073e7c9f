//! Robust multi-channel sampling for the scale.
//!
//! # Architecture
//!
//! - [`aggregate`] collapses one channel's raw readings into a single scalar
//!   (median or trimmed mean)
//! - [`SamplePlan`] fixes how many reads per channel, how fast, and how they
//!   are aggregated
//! - [`ConcurrentSampler`] runs one periodic read loop per channel, joins them
//!   and aggregates each channel's samples
//! - [`CancelToken`] lets a caller abort a sampling window in progress

pub mod aggregate;
pub mod cancel;
pub mod error;
pub mod plan;
pub mod sampler;

pub use aggregate::{AggregationMode, aggregate};
pub use cancel::CancelToken;
pub use error::{SamplingError, SamplingResult};
pub use plan::SamplePlan;
pub use sampler::ConcurrentSampler;
