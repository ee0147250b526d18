//! Correlation of metric samples with the inventory.
//!
//! Every sample is joined to its device by serial. The resulting [`Event`]
//! carries the device dimensions as `device.*` fields next to the metric
//! fields. A sample with sub-entries (one per uplink interface, say) becomes
//! one event per entry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::inventory::{Device, Inventory};
use crate::metrics::{Fields, MetricKind, MetricSample, UnmatchedPolicy, insert_opt};

/// One emitted observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub organization_id: String,
    pub metricset: MetricKind,
    #[serde(flatten)]
    pub fields: Fields,
}

/// Flatten a device into `device.*` fields. Absent attributes are omitted.
pub fn device_dimensions(device: &Device) -> Fields {
    let mut fields = Fields::new();
    fields.insert("device.serial".into(), device.key.as_str().into());
    insert_opt(&mut fields, "device.network_id", device.network_id.clone());
    insert_opt(&mut fields, "device.model", device.model.clone());
    insert_opt(&mut fields, "device.firmware", device.firmware.clone());
    insert_opt(&mut fields, "device.tags", device.tags.clone());
    insert_opt(
        &mut fields,
        "device.location",
        device.location.map(|l| l.as_lng_lat().to_vec()),
    );
    insert_opt(&mut fields, "device.imei", device.imei);
    insert_opt(&mut fields, "device.name", device.name.clone());
    insert_opt(&mut fields, "device.notes", device.notes.clone());
    insert_opt(&mut fields, "device.address", device.address.clone());
    insert_opt(&mut fields, "device.product_type", device.product_type.clone());
    insert_opt(&mut fields, "device.mac", device.mac.clone());
    insert_opt(&mut fields, "device.lan_ip", device.lan_ip.clone());
    for (name, value) in &device.details {
        fields.insert(format!("device.details.{name}"), value.clone());
    }
    fields
}

/// Join `samples` to `inventory` and build events.
///
/// A sample's own timestamp wins; otherwise `collected_at` is used. Samples
/// whose device is unknown are dropped or emitted without dimensions according
/// to `policy`. The output depends only on the inputs, so calling this twice
/// yields the same events.
pub fn correlate(
    kind: MetricKind,
    policy: UnmatchedPolicy,
    organization_id: &str,
    inventory: &Inventory,
    samples: &[MetricSample],
    collected_at: DateTime<Utc>,
) -> Vec<Event> {
    let mut events = Vec::with_capacity(samples.len());
    let mut unmatched = 0usize;

    for sample in samples {
        let device = sample.device_key.as_ref().and_then(|key| inventory.get(key));
        let base = match (device, policy) {
            (Some(device), _) => {
                let mut base = device_dimensions(device);
                base.extend(sample.fields.clone());
                base
            }
            (None, UnmatchedPolicy::Drop) => {
                unmatched += 1;
                continue;
            }
            // Samples without a key describe the organization, not a device.
            (None, UnmatchedPolicy::Degrade) => {
                unmatched += usize::from(sample.device_key.is_some());
                sample.fields.clone()
            }
        };

        let timestamp = sample.timestamp.unwrap_or(collected_at);
        let event = |fields: Fields| Event {
            timestamp,
            organization_id: organization_id.to_string(),
            metricset: kind,
            fields,
        };

        if sample.entries.is_empty() {
            events.push(event(base));
        } else {
            for entry in &sample.entries {
                let mut fields = base.clone();
                fields.extend(entry.clone());
                events.push(event(fields));
            }
        }
    }

    if unmatched > 0 {
        match policy {
            UnmatchedPolicy::Drop => tracing::debug!(
                organization = organization_id,
                metricset = %kind,
                unmatched,
                "Dropped samples without inventory device"
            ),
            UnmatchedPolicy::Degrade => tracing::trace!(
                organization = organization_id,
                metricset = %kind,
                unmatched,
                "Emitted samples without device dimensions"
            ),
        }
    }
    events
}
