//! Static device model.

use std::collections::BTreeMap;

use crate::api::wire;

/// Stable unique device identifier (the serial).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceKey(String);

impl DeviceKey {
    /// Parse a raw serial. Blank serials are not keys.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Parse an optional wire serial.
    pub fn from_wire(raw: Option<&str>) -> Option<Self> {
        raw.and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device coordinates.
///
/// Emitted as `[longitude, latitude]`; the order is part of the output contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub lng: f64,
    pub lat: f64,
}

impl GeoLocation {
    pub fn as_lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Static inventory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub key: DeviceKey,
    pub network_id: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<GeoLocation>,
    pub imei: Option<f64>,
    pub details: BTreeMap<String, serde_json::Value>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub product_type: Option<String>,
    pub mac: Option<String>,
    pub lan_ip: Option<String>,
}

impl Device {
    /// Minimal device with only a key.
    pub fn new(key: DeviceKey) -> Self {
        Self {
            key,
            network_id: None,
            model: None,
            firmware: None,
            tags: None,
            location: None,
            imei: None,
            details: BTreeMap::new(),
            name: None,
            notes: None,
            address: None,
            product_type: None,
            mac: None,
            lan_ip: None,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Normalise a wire entry. Returns `None` when the serial is missing or blank.
    pub fn from_wire(raw: wire::Device) -> Option<Self> {
        let key = DeviceKey::from_wire(raw.serial.as_deref())?;

        // A location needs both coordinates.
        let location = match (raw.lng, raw.lat) {
            (Some(lng), Some(lat)) => Some(GeoLocation { lng, lat }),
            _ => None,
        };

        let details = raw
            .details
            .unwrap_or_default()
            .into_iter()
            .map(|detail| (detail.name, detail.value))
            .collect();

        Some(Self {
            key,
            network_id: raw.network_id,
            model: raw.model,
            firmware: raw.firmware,
            tags: raw.tags,
            location,
            imei: raw.imei,
            details,
            name: raw.name,
            notes: raw.notes,
            address: raw.address,
            product_type: raw.product_type,
            mac: raw.mac,
            lan_ip: raw.lan_ip,
        })
    }

    /// Whether the model starts with `prefix` (e.g. `"MX"` for security appliances).
    pub fn model_starts_with(&self, prefix: &str) -> bool {
        self.model.as_deref().is_some_and(|m| m.starts_with(prefix))
    }
}
