//! oemanager REST client: reads agents/sessions/metrics and issues control actions.

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::types::{
    AgentInfo, AgentList, AgentRequest, ApplicationInfo, ApplicationList, Envelope, RequestList,
    SessionInfo, SessionList,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{0}'")]
    BaseUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct Connection {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct OeClient {
    http: reqwest::Client,
    base: Url,
    username: String,
    password: String,
}

impl OeClient {
    pub fn new(conn: &Connection, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(&conn.url).map_err(|_| ClientError::BaseUrl(conn.url.clone()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::BaseUrl(conn.url.clone()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            username: conn.username.clone(),
            password: conn.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `{base}/oemanager/{segments...}` with each segment percent-escaped.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::BaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("oemanager")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "oemanager request");
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, ClientError> {
        let resp = req.send().await.inspect_err(|e| warn!("oemanager transport error: {e}"))?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "oemanager returned an error");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        let v = self.send(self.request(Method::GET, url)).await?;
        let env: Envelope<T> = serde_json::from_value(v)?;
        Ok(env.result)
    }

    pub async fn applications(&self) -> Result<Vec<ApplicationInfo>, ClientError> {
        let list: ApplicationList = self.get(&["applications"]).await?;
        Ok(list.applications)
    }

    pub async fn agents(&self, app: &str) -> Result<Vec<AgentInfo>, ClientError> {
        let list: AgentList = self.get(&["applications", app, "agents"]).await?;
        Ok(list.agents)
    }

    pub async fn sessions(&self, app: &str, agent: &str) -> Result<Vec<SessionInfo>, ClientError> {
        let list: SessionList = self
            .get(&["applications", app, "agents", agent, "sessions"])
            .await?;
        Ok(list.sessions)
    }

    pub async fn requests(&self, app: &str, agent: &str) -> Result<Vec<AgentRequest>, ClientError> {
        let list: RequestList = self
            .get(&["applications", app, "agents", agent, "requests"])
            .await?;
        Ok(list.requests)
    }

    /// Session-manager counters (`requests`, `reads`, `writes`, ...).
    pub async fn session_manager_metrics(
        &self,
        app: &str,
    ) -> Result<Map<String, Value>, ClientError> {
        let v: Value = self.get(&["applications", app, "metrics"]).await?;
        Ok(into_object(v))
    }

    /// Per-agent counters (threads, sessions, requests, ...).
    pub async fn agent_metrics(
        &self,
        app: &str,
        agent: &str,
    ) -> Result<Map<String, Value>, ClientError> {
        let v: Value = self
            .get(&["applications", app, "agents", agent, "metrics"])
            .await?;
        Ok(into_object(v))
    }

    pub async fn add_agent(&self, app: &str) -> Result<Value, ClientError> {
        let url = self.endpoint(&["applications", app, "agents"])?;
        self.send(self.request(Method::POST, url).json(&json!({}))).await
    }

    pub async fn stop_agent(
        &self,
        app: &str,
        agent: &str,
        wait_to_finish_ms: u64,
        wait_after_stop_ms: u64,
    ) -> Result<Value, ClientError> {
        let mut url = self.endpoint(&["applications", app, "agents", agent])?;
        url.query_pairs_mut()
            .append_pair("waitToFinish", &wait_to_finish_ms.to_string())
            .append_pair("waitAfterStop", &wait_after_stop_ms.to_string());
        self.send(self.request(Method::DELETE, url)).await
    }

    /// Close the agent's idle sessions.
    pub async fn trim_sessions(&self, app: &str, agent: &str) -> Result<Value, ClientError> {
        let url = self.endpoint(&["applications", app, "agents", agent, "trimSessions"])?;
        self.send(self.request(Method::PUT, url)).await
    }

    pub async fn terminate_session(
        &self,
        app: &str,
        agent: &str,
        session: &str,
    ) -> Result<Value, ClientError> {
        let mut url = self.endpoint(&["applications", app, "agents", agent, "sessions", session])?;
        url.query_pairs_mut().append_pair("terminateOpt", "0");
        self.send(self.request(Method::DELETE, url)).await
    }

    pub async fn cancel_request(&self, app: &str, request_id: &str) -> Result<Value, ClientError> {
        let mut url = self.endpoint(&["applications", app, "requests"])?;
        url.query_pairs_mut().append_pair("requestID", request_id);
        self.send(self.request(Method::DELETE, url)).await
    }

    pub async fn reset_stat_data(&self, app: &str, agent: &str) -> Result<Value, ClientError> {
        let url = self.endpoint(&["applications", app, "agents", agent, "agentStatData"])?;
        self.send(self.request(Method::DELETE, url)).await
    }

    pub async fn set_object_tracking(
        &self,
        app: &str,
        agent: &str,
        enable: bool,
    ) -> Result<Value, ClientError> {
        let url = self.endpoint(&["applications", app, "agents", agent, "ABLObjects", "status"])?;
        let body = json!({ "enable": enable.to_string() });
        self.send(self.request(Method::PUT, url).json(&body)).await
    }
}

fn into_object(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}
