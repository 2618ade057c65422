use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::Error;
use crate::types::{Node, Snapshot};

pub enum MessageLogMode {
    /// Log every request plus the full parameter state of each cycle.
    Full,
    /// Log requests, a full first cycle, then only parameter changes.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: Option<Snapshot>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_write(&mut self, node_id: &str, param: &str, value: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "write",
            "node": node_id,
            "param": param,
            "value": value,
        });
        self.write_line(&entry);
    }

    pub fn log_cycle(&mut self, snapshot: &Snapshot) {
        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "cycle",
                    "nodes": snapshot.node_count(),
                    "state": snapshot_values(snapshot),
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                if let Some(prev) = &self.previous {
                    let changes: Vec<Value> = diff_snapshots(prev, snapshot)
                        .into_iter()
                        .map(|(path, old, new)| json!({"path": path, "old": old, "new": new}))
                        .collect();
                    let entry = json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "cycle",
                        "nodes": snapshot.node_count(),
                        "changes": changes,
                    });
                    self.write_line(&entry);
                } else {
                    let entry = json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "cycle",
                        "nodes": snapshot.node_count(),
                        "full": true,
                        "state": snapshot_values(snapshot),
                    });
                    self.write_line(&entry);
                }
                self.previous = Some(snapshot.clone());
            }
        }
    }

    pub fn log_cycle_error(&mut self, err: &Error) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cycle",
            "error": err.to_string(),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

fn node_values(node: &Node) -> Value {
    let map: serde_json::Map<String, Value> = node
        .params
        .iter()
        .map(|(name, p)| (name.clone(), p.value.to_json()))
        .collect();
    Value::Object(map)
}

fn snapshot_values(snapshot: &Snapshot) -> Value {
    let map: serde_json::Map<String, Value> = snapshot
        .nodes
        .iter()
        .map(|(id, node)| (id.clone(), node_values(node)))
        .collect();
    Value::Object(map)
}

/// Parameter-value changes between two published snapshots, as
/// `("node/param", old, new)` triples. Added or removed nodes and params show
/// up against `Null`.
pub(crate) fn diff_snapshots(prev: &Snapshot, curr: &Snapshot) -> Vec<(String, Value, Value)> {
    let mut changes = Vec::new();

    for (node_id, node) in &curr.nodes {
        let prev_node = prev.nodes.get(node_id);
        for (name, param) in &node.params {
            let old = prev_node
                .and_then(|n| n.params.get(name))
                .map(|p| p.value.to_json())
                .unwrap_or(Value::Null);
            let new = param.value.to_json();
            if old != new {
                changes.push((format!("{node_id}/{name}"), old, new));
            }
        }
    }

    for (node_id, node) in &prev.nodes {
        for (name, param) in &node.params {
            let gone = curr
                .nodes
                .get(node_id)
                .is_none_or(|n| !n.params.contains_key(name));
            if gone {
                let old = param.value.to_json();
                if old != Value::Null {
                    changes.push((format!("{node_id}/{name}"), old, Value::Null));
                }
            }
        }
    }

    changes
}
