use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::RainmakerClient;
use crate::normalize;
use crate::protocol::{self, NodeConfig, RawNode};
use crate::types::{Node, ParamValue, Snapshot};
use crate::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

type SnapshotCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&Error) + Send + Sync>;

/// Shared read handle onto the most recently published snapshot.
///
/// Publishing is a single reference swap; readers clone the `Arc` and never
/// block on an in-flight cycle. A failed cycle leaves the previous snapshot
/// in place.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl SnapshotHandle {
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(Arc::clone(&snapshot));
        }
        snapshot
    }
}

/// Run `op` once; on a transient failure, reconnect once and run it again.
/// The single source of retry policy for the poll cycle. Auth failures are
/// never retried.
pub(crate) async fn with_reconnect_retry<T>(
    client: &mut RainmakerClient,
    mut op: impl AsyncFnMut(&RainmakerClient) -> Result<T>,
) -> Result<T> {
    match op(client).await {
        Ok(out) => Ok(out),
        Err(err) if err.is_transient() => {
            debug!(error = %err, "transient failure, reconnecting once");
            client.connect().await?;
            op(client).await
        }
        Err(err) => Err(err),
    }
}

/// A candidate is trustworthy only when it has at least one node and every
/// node carries a non-empty parameter mapping. Half-populated responses show
/// up right after reconnect races and must not be published.
pub(crate) fn snapshot_complete(nodes: &BTreeMap<String, Node>) -> bool {
    !nodes.is_empty() && nodes.values().all(|n| !n.params.is_empty())
}

/// Periodic-refresh coordinator: fetches, normalizes and validates node data
/// each cycle, and atomically publishes an immutable snapshot on success.
pub struct Poller {
    client: RainmakerClient,
    interval: Duration,
    handle: SnapshotHandle,
    snapshot_callbacks: Vec<SnapshotCallback>,
    error_callbacks: Vec<ErrorCallback>,
}

impl Poller {
    pub fn new(client: RainmakerClient) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
            handle: SnapshotHandle::default(),
            snapshot_callbacks: Vec::new(),
            error_callbacks: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.error_callbacks.push(Box::new(f));
        self
    }

    /// Read handle for entity views; stays valid across cycles.
    pub fn snapshots(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    pub fn client(&self) -> &RainmakerClient {
        &self.client
    }

    /// Write one parameter. Callers are expected to refresh afterwards; the
    /// poller does not auto-refresh on write.
    pub async fn set_parameter(
        &self,
        node_id: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        self.client.set_parameter(node_id, name, value).await
    }

    /// Write then refresh, even when the write failed, so readers re-sync to
    /// ground truth. The write's own error still propagates.
    pub async fn set_parameter_and_refresh(
        &mut self,
        node_id: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        let write = self.client.set_parameter(node_id, name, value).await;
        if let Err(refresh_err) = self.refresh().await {
            debug!(error = %refresh_err, "post-write refresh failed");
        }
        write
    }

    /// Run one poll cycle to completion and publish the result.
    ///
    /// Per-node fetch failures degrade that node; cycle-level failures leave
    /// the previously published snapshot untouched.
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>> {
        if !self.client.is_connected() {
            self.client.connect().await?;
        }

        let listing =
            with_reconnect_retry(&mut self.client, async |c| c.list_nodes().await).await?;

        let mut nodes = self.assemble(&listing).await;

        if !snapshot_complete(&nodes) {
            debug!("candidate snapshot incomplete, reconnecting for one refetch");
            self.client.connect().await?;
            let listing = self.client.list_nodes().await?;
            nodes = self.assemble(&listing).await;
            if !snapshot_complete(&nodes) {
                return Err(Error::IncompleteData);
            }
        }

        let snapshot = self.handle.publish(Snapshot::new(nodes));
        debug!(nodes = snapshot.node_count(), "published snapshot");
        self.client.log_cycle(&snapshot);
        for cb in &self.snapshot_callbacks {
            cb(&snapshot);
        }
        Ok(snapshot)
    }

    /// Poll on a fixed interval until the shutdown watch flips to `true` (or
    /// its sender is dropped). Failures are reported and the last good
    /// snapshot stays readable.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.refresh().await {
                        warn!(error = %err, "poll cycle failed; keeping last published snapshot");
                        self.client.log_cycle_error(&err);
                        for cb in &self.error_callbacks {
                            cb(&err);
                        }
                    }
                }
            }
        }

        debug!("poller stopping");
        self.client.disconnect();
    }

    /// Fan out per-node fetches, fan in, normalize. A node whose fetch fails
    /// outright is omitted; a node that answers with empty data stays in and
    /// is caught by completeness validation.
    async fn assemble(&mut self, listing: &Value) -> BTreeMap<String, Node> {
        let raw_nodes = protocol::parse_node_listing(listing);

        let client = &self.client;
        let fetches = raw_nodes.iter().map(|raw| async move {
            let (params, config) = tokio::join!(
                fetch_node_params(client, raw),
                fetch_node_config(client, raw),
            );
            (raw, params, config)
        });
        let fetched = futures::future::join_all(fetches).await;

        let mut nodes = BTreeMap::new();
        for (raw, params, config) in fetched {
            let raw_params = match params {
                Ok(p) => p,
                Err(err) => {
                    warn!(node = %raw.node_id, error = %err, "parameter fetch failed, omitting node this cycle");
                    continue;
                }
            };
            let config = config.unwrap_or_else(|err| {
                debug!(node = %raw.node_id, error = %err, "config fetch failed, merging without metadata");
                NodeConfig::default()
            });

            let (values, wrapper) = normalize::unwrap_parameters(&raw_params);
            if let Some(service) = &wrapper {
                self.client.note_service_wrapper(&raw.node_id, service);
            }
            let routes = normalize::service_routes(&config);
            self.client.note_param_routes(&raw.node_id, routes);

            let display_name =
                normalize::display_name(raw.name.as_deref(), &raw.node_id, &values);
            let params = normalize::merge_metadata(&values, &config);

            nodes.insert(
                raw.node_id.clone(),
                Node {
                    node_id: raw.node_id.clone(),
                    display_name,
                    params,
                },
            );
        }
        nodes
    }
}

async fn fetch_node_params(client: &RainmakerClient, raw: &RawNode) -> Result<Value> {
    match client.get_parameters(&raw.node_id).await {
        Ok(params) => Ok(params),
        Err(err) => {
            if let Some(embedded) = &raw.embedded_params {
                debug!(node = %raw.node_id, error = %err, "using params embedded in node listing");
                return Ok(embedded.clone());
            }
            Err(err)
        }
    }
}

async fn fetch_node_config(client: &RainmakerClient, raw: &RawNode) -> Result<NodeConfig> {
    match client.get_config(&raw.node_id).await {
        Ok(config) => Ok(config),
        Err(err) => {
            if let Some(embedded) = &raw.embedded_config
                && let Ok(config) = serde_json::from_value::<NodeConfig>(embedded.clone())
            {
                debug!(node = %raw.node_id, error = %err, "using config embedded in node listing");
                return Ok(config);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParamValue, Parameter};

    fn node(node_id: &str, params: &[(&str, ParamValue)]) -> Node {
        Node {
            node_id: node_id.to_string(),
            display_name: node_id.to_string(),
            params: params
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        Parameter {
                            value: value.clone(),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn empty_node_set_is_incomplete() {
        assert!(!snapshot_complete(&BTreeMap::new()));
    }

    #[test]
    fn node_with_empty_params_is_incomplete() {
        let mut nodes = BTreeMap::new();
        nodes.insert("n1".to_string(), node("n1", &[("temp", ParamValue::Float(21.0))]));
        nodes.insert("n2".to_string(), node("n2", &[]));
        assert!(!snapshot_complete(&nodes));
    }

    #[test]
    fn populated_nodes_are_complete() {
        let mut nodes = BTreeMap::new();
        nodes.insert("n1".to_string(), node("n1", &[("temp", ParamValue::Float(21.0))]));
        nodes.insert("n2".to_string(), node("n2", &[("on", ParamValue::Bool(true))]));
        assert!(snapshot_complete(&nodes));
    }

    #[test]
    fn handle_starts_empty_and_swaps_atomically() {
        let handle = SnapshotHandle::default();
        assert!(handle.current().is_none());

        let mut nodes = BTreeMap::new();
        nodes.insert("n1".to_string(), node("n1", &[("temp", ParamValue::Int(20))]));
        let published = handle.publish(Snapshot::new(nodes));

        let read = handle.current().unwrap();
        assert!(Arc::ptr_eq(&published, &read));
    }
}
