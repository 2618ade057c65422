use serde::Deserialize;
use serde_json::{Map, Value, json};

pub(crate) const LOGIN_PATH: &str = "v1/login";
pub(crate) const NODES_PATH: &str = "v1/user/nodes";
pub(crate) const PARAMS_PATH: &str = "v1/user/nodes/params";
pub(crate) const CONFIG_PATH: &str = "v1/user/nodes/config";

pub(crate) fn login_body(username: &str, password: &str) -> Value {
    json!({
        "user_name": username,
        "password": password,
    })
}

/// Batch write body. The wire protocol is batch-oriented even for one write.
pub(crate) fn write_batch(node_id: &str, payload: Value) -> Value {
    json!([{
        "node_id": node_id,
        "payload": payload,
    }])
}

/// Per-item status check on a batch write response. Returns the reported
/// status when the upstream marked this node's write as anything but success.
pub(crate) fn write_failure_status(response: &Value, node_id: &str) -> Option<String> {
    match response {
        Value::Array(items) => items.iter().find_map(|item| {
            let id = item.get("node_id").and_then(|v| v.as_str())?;
            if id != node_id {
                return None;
            }
            let status = item.get("status").and_then(|v| v.as_str()).unwrap_or("");
            if status != "success" {
                Some(status.to_string())
            } else {
                None
            }
        }),
        // Some deployments answer a single-item batch with a bare object.
        Value::Object(obj) => {
            let status = obj.get("status").and_then(|v| v.as_str())?;
            if status != "success" {
                Some(status.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// One node as it appears in the listing, before any detail fetch.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawNode {
    pub node_id: String,
    pub name: Option<String>,
    /// Parameter values embedded in a `node_details` aggregate, if any.
    pub embedded_params: Option<Value>,
    /// Config embedded in a `node_details` aggregate, if any.
    pub embedded_config: Option<Value>,
}

fn node_id_of(item: &Value) -> Option<String> {
    if let Some(s) = item.as_str() {
        return Some(s.to_string());
    }
    item.get("nodeid")
        .or_else(|| item.get("id"))
        .or_else(|| item.get("node_id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn name_of(item: &Value) -> Option<String> {
    item.get("name")
        .or_else(|| item.get("Name"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn raw_node_from_item(item: &Value) -> Option<RawNode> {
    let node_id = node_id_of(item)?;
    Some(RawNode {
        node_id,
        name: name_of(item),
        embedded_params: item.get("params").cloned(),
        embedded_config: item.get("config").cloned(),
    })
}

/// Decode the node listing from the closed set of shapes the cloud returns:
/// an array of ids or objects, an object keyed by id, or a
/// `{nodes: [...], node_details: [...]}` aggregate. Unknown shapes decode to
/// an empty listing rather than guessing downstream.
pub(crate) fn parse_node_listing(raw: &Value) -> Vec<RawNode> {
    match raw {
        Value::Array(items) => items.iter().filter_map(raw_node_from_item).collect(),
        Value::Object(map) => {
            if map.contains_key("nodes") {
                parse_aggregate(map)
            } else {
                map.iter()
                    .filter_map(|(key, val)| {
                        let mut node = raw_node_from_item(val).unwrap_or_default();
                        if node.node_id.is_empty() {
                            node.node_id = key.clone();
                        }
                        if node.name.is_none() {
                            node.name = name_of(val);
                        }
                        if node.node_id.is_empty() {
                            None
                        } else {
                            Some(node)
                        }
                    })
                    .collect()
            }
        }
        _ => Vec::new(),
    }
}

fn parse_aggregate(map: &Map<String, Value>) -> Vec<RawNode> {
    let mut nodes: Vec<RawNode> = match map.get("nodes") {
        Some(Value::Array(items)) => items.iter().filter_map(raw_node_from_item).collect(),
        Some(Value::Object(keyed)) => keyed
            .iter()
            .filter_map(|(key, val)| {
                let mut node = raw_node_from_item(val).unwrap_or_default();
                if node.node_id.is_empty() {
                    node.node_id = key.clone();
                }
                Some(node)
            })
            .collect(),
        _ => Vec::new(),
    };

    // Details are matched by id and fill in names and embedded payloads.
    if let Some(Value::Array(details)) = map.get("node_details") {
        for detail in details {
            let Some(id) = node_id_of(detail) else {
                continue;
            };
            if let Some(node) = nodes.iter_mut().find(|n| n.node_id == id) {
                if node.name.is_none() {
                    node.name = name_of(detail);
                }
                if node.embedded_params.is_none() {
                    node.embedded_params = detail.get("params").cloned();
                }
                if node.embedded_config.is_none() {
                    node.embedded_config = detail.get("config").cloned();
                }
            } else {
                if let Some(extra) = raw_node_from_item(detail) {
                    nodes.push(extra);
                }
            }
        }
    }

    nodes
}

/// Per-node parameter schema as declared by the cloud config endpoint.
/// Unknown fields are ignored; missing fields default so a sparse config
/// still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

impl DeviceConfig {
    /// Subsystem/service name writes must be wrapped under.
    pub fn service_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.device_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub bounds: Option<RawBounds>,
    #[serde(default)]
    pub ui_type: Option<String>,
    #[serde(default, alias = "choices")]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
}
