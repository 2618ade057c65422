use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, NodeConfig};
use crate::types::ParamValue;
use crate::{Error, Result};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RainmakerClientBuilder {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl RainmakerClientBuilder {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    /// Per-call timeout; exceeding it surfaces as a transient HTTP error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> RainmakerClient {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(
                MessageLogger::new(mode, &path).expect("failed to open log file"),
            )),
            _ => None,
        };

        RainmakerClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            username: self.username,
            password: self.password,
            access_token: None,
            connected: false,
            service_map: HashMap::new(),
            param_service_map: HashMap::new(),
            logger,
        }
    }
}

/// Owns the authenticated session to the cloud plus the cross-cycle routing
/// caches that remember which subsystem each parameter's writes belong under.
///
/// Fetch operations take `&self` so a poll cycle can fan them out
/// concurrently; connection state and cache mutation are `&mut self` and only
/// happen between fetches.
pub struct RainmakerClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    access_token: Option<String>,
    connected: bool,
    /// node_id -> subsystem wrapper last seen around its parameter values.
    service_map: HashMap<String, String>,
    /// node_id -> (param -> declared device/service). Best-effort, never
    /// authoritative.
    param_service_map: HashMap<String, HashMap<String, String>>,
    logger: Option<Mutex<MessageLogger>>,
}

impl RainmakerClient {
    pub fn builder(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> RainmakerClientBuilder {
        RainmakerClientBuilder::new(base_url, username, password)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Authenticate and store the session token.
    ///
    /// A rejected login is `Error::Auth` and must not be retried by callers;
    /// transport failures are transient.
    pub async fn connect(&mut self) -> Result<()> {
        let url = format!("{}/{}", self.base_url, protocol::LOGIN_PATH);
        debug!(url = %url, user = %self.username, "logging in to rainmaker");
        self.log_request("POST", protocol::LOGIN_PATH, None);

        let resp = self
            .http
            .post(&url)
            .json(&protocol::login_body(&self.username, &self.password))
            .send()
            .await?;

        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(Error::Auth);
        }
        let resp = resp.error_for_status()?;
        let body: Value = resp.json().await?;

        let token = body
            .get("access_token")
            .or_else(|| body.get("accesstoken"))
            .and_then(|v| v.as_str())
            .ok_or(Error::Auth)?
            .to_string();

        self.access_token = Some(token);
        self.connected = true;
        debug!("rainmaker login successful");
        Ok(())
    }

    /// Drop the session. The token is bearer-only, so there is nothing
    /// server-side to tear down.
    pub fn disconnect(&mut self) {
        self.access_token = None;
        self.connected = false;
    }

    /// Raw node collection, in whatever shape the upstream returns.
    pub async fn list_nodes(&self) -> Result<Value> {
        let url = format!("{}/{}?node_details=true", self.base_url, protocol::NODES_PATH);
        self.log_request("GET", protocol::NODES_PATH, None);
        let resp = self.authed(self.http.get(&url))?.send().await?;
        let body: Value = resp.error_for_status()?.json().await?;
        Ok(body)
    }

    /// Raw parameter values for one node, possibly wrapped under a single
    /// subsystem key.
    pub async fn get_parameters(&self, node_id: &str) -> Result<Value> {
        let url = format!(
            "{}/{}?node_id={node_id}",
            self.base_url,
            protocol::PARAMS_PATH
        );
        self.log_request("GET", protocol::PARAMS_PATH, None);
        let resp = self.authed(self.http.get(&url))?.send().await?;
        let body: Value = resp.error_for_status()?.json().await?;
        Ok(body)
    }

    /// Declared parameter schema for one node.
    pub async fn get_config(&self, node_id: &str) -> Result<NodeConfig> {
        let url = format!(
            "{}/{}?node_id={node_id}",
            self.base_url,
            protocol::CONFIG_PATH
        );
        self.log_request("GET", protocol::CONFIG_PATH, None);
        let resp = self.authed(self.http.get(&url))?.send().await?;
        let config: NodeConfig = resp.error_for_status()?.json().await?;
        Ok(config)
    }

    /// Write one parameter through the batch endpoint and check the per-item
    /// result status. A non-success status is a `Write` error even when the
    /// HTTP call itself succeeded.
    pub async fn set_parameter(
        &self,
        node_id: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let value = value.into().to_json();
        let payload = self.route_write(node_id, name, value.clone());
        let body = protocol::write_batch(node_id, payload);

        let url = format!("{}/{}", self.base_url, protocol::PARAMS_PATH);
        debug!(node = %node_id, param = %name, "writing parameter");
        self.log_write(node_id, name, &value);

        let resp = self
            .authed(self.http.put(&url))?
            .header("x-request-id", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;
        let result: Value = resp.error_for_status()?.json().await?;

        if let Some(status) = protocol::write_failure_status(&result, node_id) {
            return Err(Error::Write {
                node_id: node_id.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Address a write to the correct subsystem wrapper: the declared per-param
    /// device first, then the wrapper last seen around this node's values,
    /// else unwrapped.
    fn route_write(&self, node_id: &str, name: &str, value: Value) -> Value {
        let declared = self
            .param_service_map
            .get(node_id)
            .and_then(|routes| routes.get(name));
        if let Some(service) = declared {
            return json!({ service: { name: value } });
        }
        if let Some(wrapper) = self.service_map.get(node_id) {
            return json!({ wrapper: { name: value } });
        }
        json!({ name: value })
    }

    /// Remember the subsystem wrapper a node's parameter payload arrived under.
    pub(crate) fn note_service_wrapper(&mut self, node_id: &str, service: &str) {
        self.service_map
            .insert(node_id.to_string(), service.to_string());
    }

    /// Remember the per-param device routing a node's config declared.
    pub(crate) fn note_param_routes(&mut self, node_id: &str, routes: HashMap<String, String>) {
        if !routes.is_empty() {
            self.param_service_map.insert(node_id.to_string(), routes);
        }
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.access_token.as_deref().ok_or(Error::NotConnected)?;
        Ok(rb.bearer_auth(token))
    }

    fn log_request(&self, method: &str, path: &str, body: Option<&Value>) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_request(method, path, body);
        }
    }

    fn log_write(&self, node_id: &str, name: &str, value: &Value) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_write(node_id, name, value);
        }
    }

    pub(crate) fn log_cycle(&self, snapshot: &crate::types::Snapshot) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_cycle(snapshot);
        }
    }

    pub(crate) fn log_cycle_error(&self, err: &Error) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_cycle_error(err);
        }
    }
}
