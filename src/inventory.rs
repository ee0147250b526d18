//! Device inventory.
//!
//! The inventory is rebuilt from scratch on every collection cycle and is the
//! source of the static dimensions attached to every emitted event.

mod device;
mod resolver;

pub use device::{Device, DeviceKey, GeoLocation};
pub use resolver::{DashboardInventory, Inventory, InventoryResolver};
