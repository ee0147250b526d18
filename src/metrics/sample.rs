//! Metric sample model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::inventory::DeviceKey;

/// Dotted field path to value.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Insert `value` under `key` only when present.
pub fn insert_opt<V: Into<serde_json::Value>>(fields: &mut Fields, key: &str, value: Option<V>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), value.into());
    }
}

/// Metricset identifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricKind {
    DeviceUplinksLossAndLatency,
    DevicePerformanceScore,
    DeviceUplinksStatusAndHa,
    DeviceUplinksCellularGatewayStatus,
    DeviceStatus,
    DeviceCounts,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        Self::DeviceUplinksLossAndLatency,
        Self::DevicePerformanceScore,
        Self::DeviceUplinksStatusAndHa,
        Self::DeviceUplinksCellularGatewayStatus,
        Self::DeviceStatus,
        Self::DeviceCounts,
    ];
}

/// What the correlator does with a sample whose device is not in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Discard the sample; device dimensions are required.
    Drop,
    /// Emit with metric fields only.
    Degrade,
}

/// One dynamic observation for one device.
///
/// `entries` are per-interface sub-records: the correlator emits one event per
/// entry, each carrying `fields` as well. A sample without entries yields a
/// single event.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Owning device; `None` when the upstream serial was blank.
    pub device_key: Option<DeviceKey>,
    /// Explicit sample time (time-series); `None` means "at collection".
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Fields,
    pub entries: Vec<Fields>,
}

impl MetricSample {
    pub fn new(device_key: Option<DeviceKey>) -> Self {
        Self {
            device_key,
            timestamp: None,
            fields: Fields::new(),
            entries: Vec::new(),
        }
    }

    /// Set the sample timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Add a field.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Add a field when present.
    pub fn with_opt<V: Into<serde_json::Value>>(mut self, key: &str, value: Option<V>) -> Self {
        insert_opt(&mut self.fields, key, value);
        self
    }

    /// Add a sub-entry.
    pub fn with_entry(mut self, entry: Fields) -> Self {
        self.entries.push(entry);
        self
    }
}
