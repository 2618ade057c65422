use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Current reading of a parameter. `Null` means "not yet observed".
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl ParamValue {
    /// Lossless where the JSON shape allows it; arrays and objects have no
    /// scalar reading and degrade to `Null`.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Bool(b) => ParamValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParamValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ParamValue::Float(f)
                } else {
                    ParamValue::Null
                }
            }
            Value::String(s) => ParamValue::Text(s.clone()),
            _ => ParamValue::Null,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Float(f) => Value::from(*f),
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Null => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view: integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamValue::Int(_) | ParamValue::Float(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s}"),
            ParamValue::Null => write!(f, "null"),
        }
    }
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Null
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

/// Declared type tag from node config. Authoritative over the runtime type of
/// the observed value when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int,
    Float,
    Other(String),
}

impl DataType {
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => DataType::Bool,
            "int" | "integer" => DataType::Int,
            "float" | "double" => DataType::Float,
            _ => DataType::Other(tag.to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

/// Min/max/step hints, meaningful only for numeric writable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

/// One normalized parameter: live value merged with its config metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub value: ParamValue,
    pub data_type: Option<DataType>,
    pub properties: Vec<String>,
    pub bounds: Option<Bounds>,
    pub ui_type: Option<String>,
    /// Presentation options, passed through opaquely.
    pub options: Option<Value>,
}

impl Parameter {
    /// A parameter with no declared properties came from the live values with
    /// no config entry; it is still displayable, so it counts as readable.
    pub fn can_read(&self) -> bool {
        self.properties.is_empty() || self.properties.iter().any(|p| p == "read")
    }

    pub fn can_write(&self) -> bool {
        self.properties.iter().any(|p| p == "write")
    }

    /// Effective type for classification: the declared tag wins, otherwise
    /// inferred from the observed value.
    pub fn effective_type(&self) -> Option<DataType> {
        if let Some(dt) = &self.data_type {
            return Some(dt.clone());
        }
        match self.value {
            ParamValue::Bool(_) => Some(DataType::Bool),
            ParamValue::Int(_) => Some(DataType::Int),
            ParamValue::Float(_) => Some(DataType::Float),
            _ => None,
        }
    }
}

/// One upstream-managed device with its normalized parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub node_id: String,
    pub display_name: String,
    pub params: BTreeMap<String, Parameter>,
}

impl Node {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Numeric reading of a parameter, if present and numeric.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(|p| p.value.as_f64())
    }
}

/// Presentation kind for one parameter (or, for `Climate`, a whole node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Climate,
    Switch,
    Number,
    Sensor,
    BinarySensor,
}

/// The immutable result of one successful poll cycle.
///
/// Published by reference and superseded, never mutated; readers may hold a
/// snapshot across cycles without locking.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: BTreeMap<String, Node>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(nodes: BTreeMap<String, Node>) -> Self {
        Self {
            nodes,
            taken_at: Utc::now(),
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn parameter(&self, node_id: &str, name: &str) -> Option<&Parameter> {
        self.nodes.get(node_id).and_then(|n| n.params.get(name))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
