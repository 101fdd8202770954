//! Per-scan device catalog
//! Deduplicates advertisements by device id. First-seen wins; cleared at the start of each scan.

use std::collections::HashMap;

use crate::core::bluetooth::types::GloveDevice;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<GloveDevice>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.index.clear();
    }

    /// Inserts `device` unless its id is already known.
    /// Returns the stored record and whether it was newly added.
    pub fn add_if_absent(&mut self, device: GloveDevice) -> (GloveDevice, bool) {
        if let Some(&position) = self.index.get(&device.id) {
            return (self.devices[position].clone(), false);
        }
        self.index.insert(device.id.clone(), self.devices.len());
        self.devices.push(device.clone());
        (device, true)
    }

    pub fn get(&self, id: &str) -> Option<&GloveDevice> {
        self.index.get(id).map(|&position| &self.devices[position])
    }

    /// Devices in insertion order
    pub fn snapshot(&self) -> Vec<GloveDevice> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
