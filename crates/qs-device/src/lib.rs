//! Acquisition-device boundary for the scale.
//!
//! The engine only ever talks to hardware through [`ChannelReader`]. This
//! crate defines that trait plus two implementations that need no hardware:
//!
//! - [`sim::SimulatedScale`]: a four-cell bench model with a movable load
//! - [`scripted::ScriptedReader`]: canned sequences and injected failures for tests

pub mod error;
pub mod reader;
pub mod scripted;
pub mod sim;

pub use error::{DeviceError, DeviceResult};
pub use reader::ChannelReader;
pub use scripted::ScriptedReader;
pub use sim::{CellModel, LoadPosition, SimulatedScale};
