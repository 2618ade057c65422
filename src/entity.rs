//! Entity classification: mapping normalized parameters onto presentation
//! kinds a host UI can bind to its own primitives.
//!
//! Known parameter names carry a convenience hint (kind, unit, icon) matched
//! case-insensitively; metadata-driven classification is the authoritative
//! fallback, and declared capability can veto a hint (a name-hinted number
//! that is not writable degrades to a sensor).

use crate::normalize::classify_by_metadata;
use crate::types::{EntityKind, Node, ParamValue, Parameter};

pub struct ParamHint {
    pub kind: EntityKind,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
}

const PARAM_MAPPINGS: &[(&str, ParamHint)] = &[
    (
        "temperature",
        ParamHint {
            kind: EntityKind::Climate,
            unit: Some("°C"),
            icon: None,
        },
    ),
    (
        "temp",
        ParamHint {
            kind: EntityKind::Sensor,
            unit: Some("°C"),
            icon: None,
        },
    ),
    (
        "temp_setpoint",
        ParamHint {
            kind: EntityKind::Number,
            unit: Some("°C"),
            icon: None,
        },
    ),
    (
        "temperature_setpoint",
        ParamHint {
            kind: EntityKind::Number,
            unit: Some("°C"),
            icon: None,
        },
    ),
    (
        "setpoint",
        ParamHint {
            kind: EntityKind::Number,
            unit: Some("°C"),
            icon: None,
        },
    ),
    (
        "mode",
        ParamHint {
            kind: EntityKind::Sensor,
            unit: None,
            icon: Some("mdi:thermostat"),
        },
    ),
    (
        "humidity",
        ParamHint {
            kind: EntityKind::Sensor,
            unit: Some("%"),
            icon: None,
        },
    ),
    (
        "fan_speed",
        ParamHint {
            kind: EntityKind::Sensor,
            unit: None,
            icon: Some("mdi:fan"),
        },
    ),
    (
        "on",
        ParamHint {
            kind: EntityKind::Switch,
            unit: None,
            icon: Some("mdi:power"),
        },
    ),
    (
        "is_on",
        ParamHint {
            kind: EntityKind::Switch,
            unit: None,
            icon: Some("mdi:power"),
        },
    ),
    (
        "enabled",
        ParamHint {
            kind: EntityKind::Switch,
            unit: None,
            icon: Some("mdi:check"),
        },
    ),
    (
        "relay",
        ParamHint {
            kind: EntityKind::Switch,
            unit: None,
            icon: Some("mdi:light-switch"),
        },
    ),
];

/// Case-insensitive lookup into the known-name table.
pub fn name_hint(name: &str) -> Option<&'static ParamHint> {
    PARAM_MAPPINGS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, hint)| hint)
}

/// Presentation kind for one parameter. The name table is a hint only;
/// metadata decides whenever the hint demands a capability the parameter
/// does not declare.
pub fn classify(name: &str, param: &Parameter) -> EntityKind {
    match name_hint(name) {
        Some(hint) => match hint.kind {
            EntityKind::Number | EntityKind::Switch if !param.can_write() => {
                classify_by_metadata(param)
            }
            kind => kind,
        },
        None => classify_by_metadata(param),
    }
}

/// One parameter (or node, for climate) bound to its presentation kind.
#[derive(Clone, Copy)]
pub enum Presentable<'a> {
    Climate(ClimateView<'a>),
    Switch(SwitchView<'a>),
    Number(NumberView<'a>),
    BinarySensor(BinarySensorView<'a>),
    Sensor(SensorView<'a>),
}

impl Presentable<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Presentable::Climate(_) => EntityKind::Climate,
            Presentable::Switch(_) => EntityKind::Switch,
            Presentable::Number(_) => EntityKind::Number,
            Presentable::BinarySensor(_) => EntityKind::BinarySensor,
            Presentable::Sensor(_) => EntityKind::Sensor,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ClimateView<'a> {
    node: &'a Node,
}

impl<'a> ClimateView<'a> {
    pub fn display_name(&self) -> &'a str {
        &self.node.display_name
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.node.numeric("temperature")
    }

    pub fn target_temperature(&self) -> Option<f64> {
        ["temp_setpoint", "temperature_setpoint", "setpoint"]
            .iter()
            .find_map(|name| self.node.numeric(name))
    }

    /// True when the node reports an explicit off mode; anything else is
    /// treated as heating.
    pub fn is_off(&self) -> bool {
        self.node
            .parameter("mode")
            .and_then(|p| p.value.as_str())
            .is_some_and(|m| m.eq_ignore_ascii_case("off"))
    }
}

#[derive(Clone, Copy)]
pub struct SwitchView<'a> {
    pub node_id: &'a str,
    pub name: &'a str,
    param: &'a Parameter,
}

impl SwitchView<'_> {
    pub fn is_on(&self) -> Option<bool> {
        match &self.param.value {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Null => None,
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
pub struct NumberView<'a> {
    pub node_id: &'a str,
    pub name: &'a str,
    param: &'a Parameter,
}

impl NumberView<'_> {
    pub fn value(&self) -> Option<f64> {
        self.param.value.as_f64()
    }

    pub fn min(&self) -> Option<f64> {
        self.param.bounds.and_then(|b| b.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.param.bounds.and_then(|b| b.max)
    }

    pub fn step(&self) -> Option<f64> {
        self.param.bounds.and_then(|b| b.step)
    }

    pub fn unit(&self) -> Option<&'static str> {
        name_hint(self.name).and_then(|h| h.unit)
    }
}

#[derive(Clone, Copy)]
pub struct BinarySensorView<'a> {
    pub node_id: &'a str,
    pub name: &'a str,
    param: &'a Parameter,
}

impl BinarySensorView<'_> {
    pub fn is_on(&self) -> Option<bool> {
        self.param.value.as_bool()
    }
}

#[derive(Clone, Copy)]
pub struct SensorView<'a> {
    pub node_id: &'a str,
    pub name: &'a str,
    param: &'a Parameter,
}

impl<'a> SensorView<'a> {
    pub fn value(&self) -> &'a ParamValue {
        &self.param.value
    }

    pub fn unit(&self) -> Option<&'static str> {
        name_hint(self.name).and_then(|h| h.unit)
    }
}

/// Bind one parameter to a presentable view. Returns `None` for parameters
/// that declare properties without `read`: they cannot be meaningfully
/// displayed.
pub fn present<'a>(node: &'a Node, name: &'a str, param: &'a Parameter) -> Option<Presentable<'a>> {
    if !param.can_read() {
        return None;
    }
    let view = match classify(name, param) {
        EntityKind::Climate => Presentable::Climate(ClimateView { node }),
        EntityKind::Switch => Presentable::Switch(SwitchView {
            node_id: &node.node_id,
            name,
            param,
        }),
        EntityKind::Number => Presentable::Number(NumberView {
            node_id: &node.node_id,
            name,
            param,
        }),
        EntityKind::BinarySensor => Presentable::BinarySensor(BinarySensorView {
            node_id: &node.node_id,
            name,
            param,
        }),
        EntityKind::Sensor => Presentable::Sensor(SensorView {
            node_id: &node.node_id,
            name,
            param,
        }),
    };
    Some(view)
}

/// All presentable views for a node, one per readable parameter (at most one
/// climate view per node).
pub fn presentables(node: &Node) -> Vec<Presentable<'_>> {
    let mut out = Vec::new();
    let mut has_climate = false;
    for (name, param) in &node.params {
        let Some(view) = present(node, name, param) else {
            continue;
        };
        if matches!(view, Presentable::Climate(_)) {
            if has_climate {
                continue;
            }
            has_climate = true;
        }
        out.push(view);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bounds, DataType};
    use std::collections::BTreeMap;

    fn param(value: ParamValue, data_type: Option<DataType>, props: &[&str]) -> Parameter {
        Parameter {
            value,
            data_type,
            properties: props.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn node_with(params: Vec<(&str, Parameter)>) -> Node {
        Node {
            node_id: "n1".into(),
            display_name: "Hall".into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn name_hint_is_case_insensitive() {
        assert!(name_hint("Relay").is_some());
        assert!(name_hint("TEMP_SETPOINT").is_some());
        assert!(name_hint("unknown_param").is_none());
    }

    #[test]
    fn hinted_switch_requires_write_capability() {
        let writable = param(ParamValue::Bool(true), Some(DataType::Bool), &["read", "write"]);
        assert_eq!(classify("relay", &writable), EntityKind::Switch);

        // Name says switch, metadata says read-only bool.
        let readonly = param(ParamValue::Bool(true), Some(DataType::Bool), &["read"]);
        assert_eq!(classify("relay", &readonly), EntityKind::BinarySensor);
    }

    #[test]
    fn hinted_number_without_write_degrades_to_sensor() {
        let readonly = param(ParamValue::Float(21.5), Some(DataType::Float), &["read"]);
        assert_eq!(classify("temp_setpoint", &readonly), EntityKind::Sensor);
    }

    #[test]
    fn temperature_maps_to_climate() {
        let p = param(ParamValue::Float(21.5), Some(DataType::Float), &["read"]);
        assert_eq!(classify("temperature", &p), EntityKind::Climate);
    }

    #[test]
    fn unknown_names_use_metadata() {
        let p = param(ParamValue::Bool(false), Some(DataType::Bool), &["read", "write"]);
        assert_eq!(classify("frost_guard", &p), EntityKind::Switch);
    }

    #[test]
    fn present_excludes_unreadable_params() {
        let node = node_with(vec![(
            "secret",
            param(ParamValue::Int(1), None, &["write"]),
        )]);
        assert!(present(&node, "secret", &node.params["secret"]).is_none());
    }

    #[test]
    fn climate_view_reads_node_level_state() {
        let node = node_with(vec![
            (
                "temperature",
                param(ParamValue::Float(21.5), Some(DataType::Float), &["read"]),
            ),
            (
                "temp_setpoint",
                param(
                    ParamValue::Float(22.0),
                    Some(DataType::Float),
                    &["read", "write"],
                ),
            ),
            ("mode", param(ParamValue::Text("off".into()), None, &["read"])),
        ]);

        let views = presentables(&node);
        let climate = views
            .iter()
            .find_map(|v| match v {
                Presentable::Climate(c) => Some(*c),
                _ => None,
            })
            .expect("node with temperature should present a climate view");

        assert_eq!(climate.display_name(), "Hall");
        assert_eq!(climate.current_temperature(), Some(21.5));
        assert_eq!(climate.target_temperature(), Some(22.0));
        assert!(climate.is_off());
    }

    #[test]
    fn number_view_exposes_bounds() {
        let mut p = param(
            ParamValue::Float(22.0),
            Some(DataType::Float),
            &["read", "write"],
        );
        p.bounds = Some(Bounds {
            min: Some(5.0),
            max: Some(30.0),
            step: Some(0.5),
        });
        let node = node_with(vec![("temp_setpoint", p)]);

        let views = presentables(&node);
        let number = views
            .iter()
            .find_map(|v| match v {
                Presentable::Number(n) => Some(*n),
                _ => None,
            })
            .expect("writable setpoint should present a number view");
        assert_eq!(number.value(), Some(22.0));
        assert_eq!(number.min(), Some(5.0));
        assert_eq!(number.max(), Some(30.0));
        assert_eq!(number.step(), Some(0.5));
        assert_eq!(number.unit(), Some("°C"));
    }

    #[test]
    fn int_backed_switch_reads_nonzero_as_on() {
        let node = node_with(vec![(
            "on",
            param(ParamValue::Int(1), Some(DataType::Bool), &["read", "write"]),
        )]);
        let views = presentables(&node);
        let switch = views
            .iter()
            .find_map(|v| match v {
                Presentable::Switch(s) => Some(*s),
                _ => None,
            })
            .expect("'on' should present a switch");
        assert_eq!(switch.is_on(), Some(true));
    }
}
