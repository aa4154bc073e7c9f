use std::collections::BTreeMap;

use qs_core::{Coefficients, DeviceSerial};

use crate::{CoefficientStore, StoreError, StoreResult};

/// In-process store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCoefficientStore {
    rows: BTreeMap<DeviceSerial, Coefficients>,
    saves: usize,
}

impl MemoryCoefficientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, serial: DeviceSerial, coefficients: Coefficients) -> Self {
        self.rows.insert(serial, coefficients);
        self
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl CoefficientStore for MemoryCoefficientStore {
    fn load(&self, serial: DeviceSerial) -> StoreResult<Coefficients> {
        self.rows
            .get(&serial)
            .copied()
            .ok_or(StoreError::NotFound { serial })
    }

    fn save(&mut self, serial: DeviceSerial, coefficients: &Coefficients) -> StoreResult<()> {
        self.rows.insert(serial, *coefficients);
        self.saves += 1;
        Ok(())
    }
}
