//! The set of devices the operator has approved.
//!
//! `TrustStore` is plain in-memory state.  It lives inside the host
//! registries and is only mutated under the registries lock; durability is
//! handled by scheduling a snapshot after each mutation (see
//! [`crate::application::state::SnapshotSink`]).

use localdesk_core::{DeviceId, TrustedDevice};

#[derive(Debug, Default, Clone)]
pub struct TrustStore {
    devices: Vec<TrustedDevice>,
}

impl TrustStore {
    /// Builds the store from persisted records, keeping the first entry for
    /// any duplicated id.
    pub fn new(devices: Vec<TrustedDevice>) -> Self {
        let mut store = Self::default();
        for device in devices {
            if !store.is_trusted(&device.id) {
                store.devices.push(device);
            }
        }
        store
    }

    pub fn is_trusted(&self, id: &DeviceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &DeviceId) -> Option<&TrustedDevice> {
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Adds `device`.  If the id is already trusted only the display name is
    /// refreshed.  Returns `true` when a new entry was created.
    pub fn insert(&mut self, device: TrustedDevice) -> bool {
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => {
                existing.name = device.name;
                false
            }
            None => {
                self.devices.push(device);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<TrustedDevice> {
        let index = self.devices.iter().position(|d| &d.id == id)?;
        Some(self.devices.remove(index))
    }

    pub fn list(&self) -> &[TrustedDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
