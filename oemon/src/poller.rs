//! Polling loop: fetches one snapshot per tick and turns it into a `Sample`.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::{ClientError, OeClient};
use crate::history::{Millis, Sample};
use crate::key::{EntityId, SeriesKey};
use crate::types::{AgentInfo, AgentRequest, AgentState, SessionInfo, SessionState};

/// Session-manager counters charted as scalars.
pub const SESSION_MANAGER_METRICS: &[&str] = &[
    REQUESTS,
    "reads",
    "writes",
    "readErrors",
    "writeErrors",
    "numReserveABLSessionWaits",
    "numReserveABLSessionTimeouts",
    "concurrentConnectedClients",
    "maxConcurrentClients",
];

pub const REQUESTS: &str = "requests";
pub const AGENTS_AVAILABLE: &str = "agentsAvailable";
pub const AGENTS_STOPPING: &str = "agentsStopping";
pub const SESSIONS_IDLE: &str = "sessionsIdle";
pub const SESSIONS_BUSY: &str = "sessionsBusy";
pub const MEMORY_USED: &str = "memoryUsed";

/// Prefix for counters from the scoped agent's own metrics endpoint.
pub const AGENT_METRIC_PREFIX: &str = "agent.";

pub const SESSION_MEMORY: &str = "sessionMemory";
pub const REQUESTS_COMPLETED: &str = "requestsCompleted";
pub const REQUESTS_FAILED: &str = "requestsFailed";

/// The monitored target: one application, optionally narrowed to one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub application: String,
    pub agent: Option<String>,
}

impl Scope {
    pub fn application(name: impl Into<String>) -> Self {
        Self {
            application: name.into(),
            agent: None,
        }
    }

    pub fn with_agent(&self, agent: Option<String>) -> Self {
        Self {
            application: self.application.clone(),
            agent,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.agent {
            Some(a) => write!(f, "{}/{}", self.application, a),
            None => write!(f, "{}", self.application),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub agent: AgentInfo,
    pub sessions: Vec<SessionInfo>,
    pub requests: Vec<AgentRequest>,
}

/// Everything fetched in one tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub at: Millis,
    pub agents: Vec<AgentSnapshot>,
    pub metrics: Map<String, Value>,
    /// Counters of the scoped agent; empty at application scope.
    pub agent_metrics: Map<String, Value>,
}

impl Snapshot {
    /// Stats-panel keys for the numeric agent counters in this snapshot.
    pub fn agent_metric_keys(&self) -> Vec<SeriesKey> {
        self.agent_metrics
            .iter()
            .filter(|(_, v)| matches!(v, Value::Number(_) | Value::String(_)))
            .map(|(name, _)| agent_metric_key(name))
            .collect()
    }
}

pub fn agent_metric_key(name: &str) -> SeriesKey {
    SeriesKey::scalar(format!("{AGENT_METRIC_PREFIX}{name}"))
}

/// Fetch agents, their sessions and in-flight requests, and the
/// session-manager counters, one call after another.
pub async fn collect(client: &OeClient, scope: &Scope) -> Result<Snapshot, ClientError> {
    let app = scope.application.as_str();
    let mut agents = Vec::new();
    for agent in client.agents(app).await? {
        if scope.agent.as_deref().is_some_and(|id| id != agent.agent_id) {
            continue;
        }
        let sessions = client.sessions(app, &agent.agent_id).await?;
        // In-flight requests are best effort; older PASOE releases lack the endpoint.
        let requests = match client.requests(app, &agent.agent_id).await {
            Ok(r) => r,
            Err(e) => {
                debug!(agent = %agent.agent_id, "requests unavailable: {e}");
                Vec::new()
            }
        };
        agents.push(AgentSnapshot {
            agent,
            sessions,
            requests,
        });
    }
    let metrics = client.session_manager_metrics(app).await?;
    let agent_metrics = match scope.agent.as_deref() {
        Some(agent) => match client.agent_metrics(app, agent).await {
            Ok(m) => m,
            Err(e) => {
                debug!(%agent, "agent metrics unavailable: {e}");
                Map::new()
            }
        },
        None => Map::new(),
    };
    Ok(Snapshot {
        at: chrono::Utc::now().timestamp_millis(),
        agents,
        metrics,
        agent_metrics,
    })
}

/// Read a JSON value as a number. Missing is `None`; anything non-numeric is
/// `None` too, with a warning.
pub fn numeric(name: &str, v: Option<&Value>) -> Option<f64> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(x) => Some(x),
            Err(_) => {
                warn!(metric = name, value = %s, "non-numeric metric value");
                None
            }
        },
        Some(other) => {
            warn!(metric = name, value = %other, "non-numeric metric value");
            None
        }
    }
}

pub fn build_sample(snap: &Snapshot) -> Sample {
    let mut sample = Sample::new(snap.at);

    for &name in SESSION_MANAGER_METRICS {
        sample.record_reading(SeriesKey::scalar(name), numeric(name, snap.metrics.get(name)));
    }

    let count_agents = |want: AgentState| {
        snap.agents
            .iter()
            .filter(|a| a.agent.agent_state() == want)
            .count() as f64
    };
    sample.record(SeriesKey::scalar(AGENTS_AVAILABLE), count_agents(AgentState::Available));
    sample.record(SeriesKey::scalar(AGENTS_STOPPING), count_agents(AgentState::Stopping));

    let sessions = || snap.agents.iter().flat_map(|a| a.sessions.iter());
    let count_sessions =
        |want: SessionState| sessions().filter(|s| s.session_state() == want).count() as f64;
    sample.record(SeriesKey::scalar(SESSIONS_IDLE), count_sessions(SessionState::Idle));
    sample.record(SeriesKey::scalar(SESSIONS_BUSY), count_sessions(SessionState::Busy));

    let mut memory_total = 0.0;
    for a in &snap.agents {
        for s in &a.sessions {
            let id = EntityId::new(&a.agent.agent_id, &s.session_id);
            let mem = numeric(SESSION_MEMORY, s.memory.as_ref());
            memory_total += mem.unwrap_or(0.0);
            sample.record_reading(SeriesKey::entity(SESSION_MEMORY, id.clone()), mem);
            sample.record_reading(
                SeriesKey::entity(REQUESTS_COMPLETED, id.clone()),
                numeric(REQUESTS_COMPLETED, s.completed_requests.as_ref()),
            );
            sample.record_reading(
                SeriesKey::entity(REQUESTS_FAILED, id),
                numeric(REQUESTS_FAILED, s.failed_requests.as_ref()),
            );
        }
    }
    sample.record(SeriesKey::scalar(MEMORY_USED), memory_total);

    // nested objects in the agent payload are not counters
    for (name, v) in &snap.agent_metrics {
        if matches!(v, Value::Number(_) | Value::String(_)) {
            sample.record_reading(agent_metric_key(name), numeric(name, Some(v)));
        }
    }

    sample
}

/// Result of one tick, tagged with the scope epoch it was started under.
#[derive(Debug)]
pub struct PollEvent {
    pub epoch: u64,
    pub outcome: Result<Snapshot, ClientError>,
}

/// Poll `scope` every `period` until the receiver goes away or the task is
/// aborted. A tick starts only after the previous one has been delivered.
pub fn spawn_poller<E>(
    client: OeClient,
    scope: Scope,
    epoch: u64,
    period: Duration,
    tx: mpsc::Sender<E>,
) -> JoinHandle<()>
where
    E: From<PollEvent> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let outcome = collect(&client, &scope).await;
            if let Err(e) = &outcome {
                warn!(%scope, "poll failed: {e}");
            }
            if tx.send(PollEvent { epoch, outcome }.into()).await.is_err() {
                debug!(%scope, "poll receiver closed");
                break;
            }
            sleep(period).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Aggregator;
    use serde_json::json;

    fn session(id: &str, state: &str, mem: Value, done: Value) -> SessionInfo {
        SessionInfo {
            session_id: id.into(),
            state: state.into(),
            memory: Some(mem),
            completed_requests: Some(done),
            failed_requests: None,
        }
    }

    fn agent(id: &str, state: &str, sessions: Vec<SessionInfo>) -> AgentSnapshot {
        AgentSnapshot {
            agent: AgentInfo {
                agent_id: id.into(),
                pid: None,
                state: state.into(),
            },
            sessions,
            requests: Vec::new(),
        }
    }

    fn snapshot() -> Snapshot {
        let metrics = json!({
            "requests": 40,
            "reads": "12",
            "writes": true,
            "concurrentConnectedClients": 2
        });
        Snapshot {
            at: 1_000,
            agents: vec![
                agent(
                    "a-1",
                    "AVAILABLE",
                    vec![
                        session("1", "IDLE", json!(1024), json!(5)),
                        session("2", "ACTIVE", json!(2048), json!(7)),
                    ],
                ),
                agent("a2", "STOPPING", vec![session("3", "IDLE", json!("oops"), json!(0))]),
            ],
            metrics: metrics.as_object().cloned().unwrap_or_default(),
            agent_metrics: Map::new(),
        }
    }

    #[test]
    fn scalar_metrics_and_derived_counts() {
        let s = build_sample(&snapshot());
        let get = |k: &str| s.reading(&SeriesKey::scalar(k));
        assert_eq!(get("requests"), Some(Some(40.0)));
        assert_eq!(get("reads"), Some(Some(12.0)));
        assert_eq!(get("writes"), Some(None));
        assert_eq!(get("readErrors"), Some(None));
        assert_eq!(get(AGENTS_AVAILABLE), Some(Some(1.0)));
        assert_eq!(get(AGENTS_STOPPING), Some(Some(1.0)));
        assert_eq!(get(SESSIONS_IDLE), Some(Some(2.0)));
        assert_eq!(get(SESSIONS_BUSY), Some(Some(1.0)));
        assert_eq!(get(MEMORY_USED), Some(Some(3072.0)));
    }

    #[test]
    fn per_session_keys_use_typed_entity_ids() {
        let s = build_sample(&snapshot());
        let key = SeriesKey::entity(SESSION_MEMORY, EntityId::new("a-1", "2"));
        assert_eq!(s.reading(&key), Some(Some(2048.0)));
        let bad = SeriesKey::entity(SESSION_MEMORY, EntityId::new("a2", "3"));
        assert_eq!(s.reading(&bad), Some(None));
        let done = SeriesKey::entity(REQUESTS_COMPLETED, EntityId::new("a-1", "1"));
        assert_eq!(s.reading(&done), Some(Some(5.0)));
    }

    #[test]
    fn unparseable_session_memory_is_not_tracked() {
        let mut agg = Aggregator::new(20);
        agg.ingest(&build_sample(&snapshot()));
        assert!(!agg.is_tracked(&SeriesKey::entity(SESSION_MEMORY, EntityId::new("a2", "3"))));
        assert_eq!(agg.keys_for_metric(SESSION_MEMORY).count(), 2);
        assert!(agg.is_tracked(&SeriesKey::scalar("concurrentConnectedClients")));
        assert!(!agg.is_tracked(&SeriesKey::scalar("writes")));
    }

    #[test]
    fn agent_counters_become_prefixed_scalars() {
        let mut snap = snapshot();
        snap.agent_metrics = json!({
            "requests": 12,
            "activeThreads": "3",
            "memoryDetail": { "heap": 1 }
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        let s = build_sample(&snap);
        assert_eq!(s.reading(&agent_metric_key("requests")), Some(Some(12.0)));
        assert_eq!(s.reading(&SeriesKey::scalar("agent.activeThreads")), Some(Some(3.0)));
        assert_eq!(s.reading(&agent_metric_key("memoryDetail")), None);
        // the session-manager counter of the same name stays separate
        assert_eq!(s.reading(&SeriesKey::scalar(REQUESTS)), Some(Some(40.0)));

        let keys: Vec<String> = snap.agent_metric_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["agent.activeThreads", "agent.requests"]);
    }

    #[test]
    fn scope_display() {
        let s = Scope::application("oepas1");
        assert_eq!(s.to_string(), "oepas1");
        assert_eq!(s.with_agent(Some("x".into())).to_string(), "oepas1/x");
    }

    #[test]
    fn numeric_handles_strings_and_nulls() {
        assert_eq!(numeric("m", Some(&json!(" 7.5 "))), Some(7.5));
        assert_eq!(numeric("m", Some(&Value::Null)), None);
        assert_eq!(numeric("m", None), None);
        assert_eq!(numeric("m", Some(&json!([1]))), None);
    }
}
