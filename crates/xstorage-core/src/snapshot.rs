// Published device snapshot
//
// One immutable value per successful polling cycle: every catalog
// endpoint mapped to its reduced body, in catalog order, plus the time
// the cycle completed. Consumers share it behind an `Arc`.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use xstorage_api::Endpoint;

/// Dotted path of the battery state of charge inside a snapshot.
pub const BATTERY_LEVEL_PATH: &str = "status.energyFlow.stateOfCharge";

const MANUFACTURER: &str = "Eaton";
const MODEL: &str = "xStorage Home";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    fields: IndexMap<Endpoint, Value>,
}

impl Snapshot {
    pub fn new(fields: IndexMap<Endpoint, Value>, fetched_at: DateTime<Utc>) -> Self {
        Self { fetched_at, fields }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn fields(&self) -> &IndexMap<Endpoint, Value> {
        &self.fields
    }

    pub fn get(&self, endpoint: Endpoint) -> Option<&Value> {
        self.fields.get(&endpoint)
    }

    /// `true` if `endpoint` was polled and produced something other than `{}`.
    pub fn has_data(&self, endpoint: Endpoint) -> bool {
        self.get(endpoint).is_some_and(|v| !is_empty_value(v))
    }

    /// Look up a dotted path such as `"status.energyFlow.stateOfCharge"`.
    ///
    /// The first segment names the endpoint; later segments walk object
    /// keys, or array indices when the current value is an array.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let endpoint: Endpoint = segments.next()?.parse().ok()?;
        let mut current = self.get(endpoint)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Battery state of charge in percent.
    pub fn battery_level(&self) -> Option<f64> {
        self.value_at(BATTERY_LEVEL_PATH).and_then(Value::as_f64)
    }

    /// Identity block derived from the `device` field.
    pub fn device_info(&self, configuration_url: impl Into<String>) -> DeviceInfo {
        DeviceInfo::from_device(self.get(Endpoint::Device), configuration_url.into())
    }
}

/// `{}` and `null` both mean "no data".
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ── Device identity ─────────────────────────────────────────────────

/// Human-facing description of the device, as shown by integrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub sw_version: Option<String>,
    pub hw_version: Option<String>,
    pub serial_number: Option<String>,
    pub configuration_url: String,
}

impl DeviceInfo {
    pub fn from_device(device: Option<&Value>, configuration_url: String) -> Self {
        let field = |key: &str| device.and_then(|d| d.get(key)).and_then(scalar_text);

        let model = match field("inverterModelName") {
            Some(inverter) => format!("{MODEL} ({inverter})"),
            None => MODEL.to_owned(),
        };

        Self {
            manufacturer: MANUFACTURER.to_owned(),
            model,
            sw_version: field("firmwareVersion"),
            hw_version: field("bmsFirmwareVersion"),
            serial_number: field("inverterSerialNumber"),
            configuration_url,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> Snapshot {
        let mut fields = IndexMap::new();
        fields.insert(
            Endpoint::Status,
            json!({"energyFlow": {"stateOfCharge": 87, "acPvRole": "GRID"}, "cells": [3.31, 3.29]}),
        );
        fields.insert(
            Endpoint::Device,
            json!({
                "firmwareVersion": "1.2.3",
                "inverterModelName": "XSTH-6",
                "inverterSerialNumber": "BJ2K4000",
                "bmsFirmwareVersion": 42,
            }),
        );
        fields.insert(Endpoint::Metrics, json!({}));
        Snapshot::new(fields, Utc::now())
    }

    #[test]
    fn dotted_paths_walk_objects_and_arrays() {
        let snap = sample();
        assert_eq!(snap.value_at("status.energyFlow.acPvRole"), Some(&json!("GRID")));
        assert_eq!(snap.value_at("status.cells.1"), Some(&json!(3.29)));
        assert_eq!(snap.value_at("status.missing"), None);
        assert_eq!(snap.value_at("not_an_endpoint.x"), None);
    }

    #[test]
    fn battery_level_reads_state_of_charge() {
        assert_eq!(sample().battery_level(), Some(87.0));
        let empty = Snapshot::new(IndexMap::new(), Utc::now());
        assert_eq!(empty.battery_level(), None);
    }

    #[test]
    fn has_data_treats_empty_object_as_missing() {
        let snap = sample();
        assert!(snap.has_data(Endpoint::Status));
        assert!(!snap.has_data(Endpoint::Metrics));
        assert!(!snap.has_data(Endpoint::Schedule));
    }

    #[test]
    fn device_info_refines_model_and_versions() {
        let info = sample().device_info("https://192.168.1.50");
        assert_eq!(
            info,
            DeviceInfo {
                manufacturer: "Eaton".into(),
                model: "xStorage Home (XSTH-6)".into(),
                sw_version: Some("1.2.3".into()),
                hw_version: Some("42".into()),
                serial_number: Some("BJ2K4000".into()),
                configuration_url: "https://192.168.1.50".into(),
            }
        );
    }

    #[test]
    fn device_info_without_device_data_uses_defaults() {
        let info = DeviceInfo::from_device(None, "https://h".into());
        assert_eq!(info.model, "xStorage Home");
        assert_eq!(info.serial_number, None);
    }

    #[test]
    fn serializes_fields_in_catalog_order() {
        let value = serde_json::to_value(sample()).ok();
        let keys: Vec<String> = value
            .as_ref()
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["fetched_at", "status", "device", "metrics"]);
    }
}
