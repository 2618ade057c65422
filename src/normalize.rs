//! Pure normalization of raw cloud payloads into the canonical shape.
//!
//! No I/O here: these functions take decoded wire data and produce the merged
//! per-node parameter records the poller publishes. Discovered service
//! wrappers and per-param routes are returned to the caller, which feeds them
//! into the transport adapter's routing cache.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::protocol::NodeConfig;
use crate::types::{Bounds, DataType, EntityKind, ParamValue, Parameter};

/// Detect a single-key subsystem wrapper around a node's parameter values.
///
/// `{"multicontrol": {"temp": 21}}` unwraps to the inner map plus the wrapper
/// name; an already-flat map passes through unchanged with no detected
/// subsystem. Non-map input normalizes to an empty map.
pub fn unwrap_parameters(raw: &Value) -> (Map<String, Value>, Option<String>) {
    let Value::Object(map) = raw else {
        return (Map::new(), None);
    };
    if map.len() == 1 {
        let (key, inner) = map
            .iter()
            .next()
            .expect("map with len 1 has a first entry");
        if let Value::Object(inner_map) = inner {
            return (inner_map.clone(), Some(key.clone()));
        }
    }
    (map.clone(), None)
}

/// Merge live parameter values with config-declared metadata.
///
/// Config is the source of truth for typing, capability, bounds and UI hints;
/// live values are the source of truth for the current reading (`Null` when a
/// declared parameter has not reported yet). Values with no config entry pass
/// through with empty metadata.
pub fn merge_metadata(
    values: &Map<String, Value>,
    config: &NodeConfig,
) -> BTreeMap<String, Parameter> {
    let mut merged = BTreeMap::new();

    for device in &config.devices {
        for def in &device.params {
            let Some(name) = def.name.as_deref() else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let value = values
                .get(name)
                .map(ParamValue::from_json)
                .unwrap_or(ParamValue::Null);
            let bounds = def.bounds.map(|b| Bounds {
                min: b.min,
                max: b.max,
                step: b.step,
            });
            merged.insert(
                name.to_string(),
                Parameter {
                    value,
                    data_type: def.data_type.as_deref().map(DataType::parse),
                    properties: def.properties.clone(),
                    bounds,
                    ui_type: def.ui_type.clone(),
                    options: def.options.clone(),
                },
            );
        }
    }

    for (name, raw) in values {
        merged.entry(name.clone()).or_insert_with(|| Parameter {
            value: ParamValue::from_json(raw),
            ..Default::default()
        });
    }

    merged
}

/// Metadata-driven classification fallback. Deterministic and total: every
/// parameter maps to exactly one kind.
///
/// Bool-typed parameters present as switches when writable and binary sensors
/// when read-only; numeric parameters present as numbers when writable and
/// sensors otherwise; everything else is a sensor.
pub fn classify_by_metadata(param: &Parameter) -> EntityKind {
    match param.effective_type() {
        Some(DataType::Bool) => {
            if param.can_write() {
                EntityKind::Switch
            } else {
                EntityKind::BinarySensor
            }
        }
        Some(dt) if dt.is_numeric() => {
            if param.can_write() {
                EntityKind::Number
            } else {
                EntityKind::Sensor
            }
        }
        _ => EntityKind::Sensor,
    }
}

/// Per-param service routing declared by the config: which device/subsystem a
/// write for each parameter must be addressed to.
pub(crate) fn service_routes(config: &NodeConfig) -> HashMap<String, String> {
    let mut routes = HashMap::new();
    for device in &config.devices {
        let Some(service) = device.service_name() else {
            continue;
        };
        for def in &device.params {
            if let Some(name) = def.name.as_deref()
                && !name.is_empty()
            {
                routes.insert(name.to_string(), service.to_string());
            }
        }
    }
    routes
}

/// Best-effort display name: the listing's name, else a `Name`/`name`
/// parameter value, else the node id.
pub(crate) fn display_name(
    listed: Option<&str>,
    node_id: &str,
    values: &Map<String, Value>,
) -> String {
    if let Some(name) = listed
        && !name.is_empty()
        && name != node_id
    {
        return name.to_string();
    }
    values
        .get("Name")
        .or_else(|| values.get("name"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| node_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NodeConfig;
    use serde_json::json;

    fn config(raw: Value) -> NodeConfig {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn unwrap_detects_subsystem_wrapper() {
        let (inner, service) = unwrap_parameters(&json!({"multicontrol": {"temp": 21}}));
        assert_eq!(service.as_deref(), Some("multicontrol"));
        assert_eq!(inner.get("temp"), Some(&json!(21)));
    }

    #[test]
    fn unwrap_is_idempotent_on_flat_maps() {
        let flat = json!({"temp": 21, "humidity": 40});
        let (inner, service) = unwrap_parameters(&flat);
        assert!(service.is_none());
        assert_eq!(Value::Object(inner), flat);
    }

    #[test]
    fn unwrap_single_scalar_entry_is_not_a_wrapper() {
        let (inner, service) = unwrap_parameters(&json!({"temp": 21}));
        assert!(service.is_none());
        assert_eq!(inner.get("temp"), Some(&json!(21)));
    }

    #[test]
    fn unwrap_non_map_is_empty() {
        let (inner, service) = unwrap_parameters(&json!([1, 2]));
        assert!(service.is_none());
        assert!(inner.is_empty());
    }

    #[test]
    fn merge_keeps_declared_metadata_and_live_value() {
        let cfg = config(json!({
            "devices": [{
                "name": "multicontrol",
                "params": [{
                    "name": "temp_setpoint",
                    "data_type": "float",
                    "properties": ["read", "write"],
                    "bounds": {"min": 5, "max": 30, "step": 0.5},
                }],
            }],
        }));
        let values = serde_json::from_value(json!({"temp_setpoint": 22.5})).unwrap();

        let merged = merge_metadata(&values, &cfg);
        let p = &merged["temp_setpoint"];
        assert_eq!(p.value, ParamValue::Float(22.5));
        assert_eq!(p.data_type, Some(DataType::Float));
        assert!(p.can_write());
        let bounds = p.bounds.unwrap();
        assert_eq!(bounds.min, Some(5.0));
        assert_eq!(bounds.max, Some(30.0));
        assert_eq!(bounds.step, Some(0.5));
    }

    #[test]
    fn declared_param_without_reading_is_null() {
        let cfg = config(json!({
            "devices": [{"name": "multicontrol", "params": [{"name": "humidity", "properties": ["read"]}]}],
        }));
        let values = Map::new();
        let merged = merge_metadata(&values, &cfg);
        assert!(merged["humidity"].value.is_null());
    }

    #[test]
    fn undeclared_value_passes_through_with_empty_metadata() {
        let cfg = NodeConfig::default();
        let values = serde_json::from_value(json!({"fw_version": "1.2.0"})).unwrap();
        let merged = merge_metadata(&values, &cfg);
        let p = &merged["fw_version"];
        assert_eq!(p.value, ParamValue::Text("1.2.0".into()));
        assert!(p.properties.is_empty());
        assert!(p.data_type.is_none());
    }

    #[test]
    fn classify_writable_bool_is_switch() {
        let p = Parameter {
            value: ParamValue::Bool(true),
            data_type: Some(DataType::Bool),
            properties: vec!["read".into(), "write".into()],
            ..Default::default()
        };
        // Deterministic: same input, same answer, every time.
        for _ in 0..3 {
            assert_eq!(classify_by_metadata(&p), EntityKind::Switch);
        }
    }

    #[test]
    fn classify_readonly_bool_is_binary_sensor() {
        let p = Parameter {
            data_type: Some(DataType::Bool),
            properties: vec!["read".into()],
            ..Default::default()
        };
        assert_eq!(classify_by_metadata(&p), EntityKind::BinarySensor);
    }

    #[test]
    fn classify_numeric_by_capability() {
        let writable = Parameter {
            value: ParamValue::Float(21.0),
            data_type: Some(DataType::Float),
            properties: vec!["read".into(), "write".into()],
            ..Default::default()
        };
        assert_eq!(classify_by_metadata(&writable), EntityKind::Number);

        let readonly = Parameter {
            value: ParamValue::Float(21.0),
            data_type: Some(DataType::Float),
            properties: vec!["read".into()],
            ..Default::default()
        };
        assert_eq!(classify_by_metadata(&readonly), EntityKind::Sensor);
    }

    #[test]
    fn classify_declared_type_beats_runtime_type() {
        // Metadata says bool even though the wire carried 1.
        let p = Parameter {
            value: ParamValue::Int(1),
            data_type: Some(DataType::Bool),
            properties: vec!["read".into(), "write".into()],
            ..Default::default()
        };
        assert_eq!(classify_by_metadata(&p), EntityKind::Switch);
    }

    #[test]
    fn classify_everything_else_is_sensor() {
        let text = Parameter {
            value: ParamValue::Text("auto".into()),
            ..Default::default()
        };
        assert_eq!(classify_by_metadata(&text), EntityKind::Sensor);

        let unobserved = Parameter::default();
        assert_eq!(classify_by_metadata(&unobserved), EntityKind::Sensor);
    }

    #[test]
    fn service_routes_from_config() {
        let cfg = config(json!({
            "devices": [
                {"name": "multicontrol", "params": [{"name": "temp"}, {"name": "on"}]},
                {"type": "aux", "params": [{"name": "boost"}]},
            ],
        }));
        let routes = service_routes(&cfg);
        assert_eq!(routes.get("temp").map(String::as_str), Some("multicontrol"));
        assert_eq!(routes.get("boost").map(String::as_str), Some("aux"));
    }

    #[test]
    fn display_name_fallback_chain() {
        let values = serde_json::from_value(json!({"Name": "Hall unit"})).unwrap();
        assert_eq!(display_name(Some("Hall"), "n1", &values), "Hall");
        assert_eq!(display_name(None, "n1", &values), "Hall unit");
        assert_eq!(display_name(Some("n1"), "n1", &values), "Hall unit");
        assert_eq!(display_name(None, "n1", &Map::new()), "n1");
    }
}
