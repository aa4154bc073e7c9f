//! qs-store: persisted calibration coefficients keyed by device serial.

pub mod csv_store;
pub mod memory;

pub use csv_store::CsvCoefficientStore;
pub use memory::MemoryCoefficientStore;

use qs_core::{Coefficients, CoreError, DeviceSerial};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No coefficients stored for device {serial}")]
    NotFound { serial: DeviceSerial },

    #[error("Malformed coefficient row at line {line}: {what}")]
    MalformedRow { line: u64, what: String },

    #[error("Invalid coefficients: {0}")]
    Core(#[from] CoreError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// A flat table of coefficient rows, one per device serial.
pub trait CoefficientStore {
    /// Coefficients for `serial`, or [`StoreError::NotFound`].
    fn load(&self, serial: DeviceSerial) -> StoreResult<Coefficients>;

    /// Replace the row for `serial` (appending it if absent). Rows for other
    /// serials are left untouched.
    fn save(&mut self, serial: DeviceSerial, coefficients: &Coefficients) -> StoreResult<()>;
}

impl<S: CoefficientStore + ?Sized> CoefficientStore for &mut S {
    fn load(&self, serial: DeviceSerial) -> StoreResult<Coefficients> {
        (**self).load(serial)
    }

    fn save(&mut self, serial: DeviceSerial, coefficients: &Coefficients) -> StoreResult<()> {
        (**self).save(serial, coefficients)
    }
}
