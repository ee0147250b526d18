//! Inventory resolution.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{Device, DeviceKey};
use crate::api::{DashboardApi, wire};
use crate::collector::{CollectorError, OrganizationTarget};

/// Devices of one organization keyed by serial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    devices: BTreeMap<DeviceKey, Device>,
}

impl Inventory {
    /// Build from wire entries in fetch order.
    ///
    /// Entries without a usable serial are skipped. When two entries share a
    /// serial the later one wins.
    pub fn from_wire(raw: impl IntoIterator<Item = wire::Device>) -> Self {
        let mut inventory = Self::default();
        let mut keyless = 0usize;
        for entry in raw {
            match Device::from_wire(entry) {
                Some(device) => {
                    inventory.insert(device);
                }
                None => keyless += 1,
            }
        }
        if keyless > 0 {
            tracing::debug!(skipped = keyless, "Skipped inventory entries without serial");
        }
        inventory
    }

    /// Insert a device, replacing any previous entry with the same key.
    pub fn insert(&mut self, device: Device) -> Option<Device> {
        let replaced = self.devices.insert(device.key.clone(), device);
        if let Some(previous) = &replaced {
            tracing::debug!(serial = %previous.key, "Duplicate serial in inventory; keeping later entry");
        }
        replaced
    }

    pub fn get(&self, key: &DeviceKey) -> Option<&Device> {
        self.devices.get(key)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Keys of devices matching `predicate`, in key order.
    pub fn keys_where(&self, predicate: impl Fn(&Device) -> bool) -> Vec<DeviceKey> {
        self.devices
            .values()
            .filter(|d| predicate(d))
            .map(|d| d.key.clone())
            .collect()
    }
}

impl FromIterator<Device> for Inventory {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        let mut inventory = Self::default();
        for device in iter {
            inventory.insert(device);
        }
        inventory
    }
}

/// Resolves the current device inventory of an organization.
#[async_trait]
pub trait InventoryResolver: Send + Sync + 'static {
    /// Fetch and normalise the full device list.
    ///
    /// # Errors
    /// Any upstream or decode failure: the inventory cannot be trusted partially.
    async fn resolve(&self, target: &OrganizationTarget) -> Result<Inventory, CollectorError>;
}

/// Inventory resolver backed by the dashboard device listing.
#[derive(Debug, Clone)]
pub struct DashboardInventory {
    api: DashboardApi,
}

impl DashboardInventory {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl InventoryResolver for DashboardInventory {
    async fn resolve(&self, target: &OrganizationTarget) -> Result<Inventory, CollectorError> {
        let raw = self.api.organization_devices(target).await?;
        let fetched = raw.len();
        let inventory = Inventory::from_wire(raw);
        tracing::debug!(
            organization = %target.id,
            fetched,
            devices = inventory.len(),
            "Resolved inventory"
        );
        Ok(inventory)
    }
}
