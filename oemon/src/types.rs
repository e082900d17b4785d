//! Types that mirror the oemanager JSON schema.
//!
//! oemanager is not consistent about field casing between releases
//! (`SessionMemory` vs `sessionMemory`), so every field accepts both spellings
//! here and nothing downstream has to care.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Every oemanager response wraps its payload in `{"result": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApplicationList {
    #[serde(default, rename = "Application", alias = "application", alias = "applications")]
    pub applications: Vec<ApplicationInfo>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AgentList {
    #[serde(default, alias = "Agents")]
    pub agents: Vec<AgentInfo>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionList {
    #[serde(default, rename = "AgentSession", alias = "agentSession", alias = "sessions")]
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RequestList {
    #[serde(default, rename = "AgentRequest", alias = "agentRequest", alias = "requests")]
    pub requests: Vec<AgentRequest>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ApplicationInfo {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Version")]
    pub version: Option<String>,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AgentInfo {
    #[serde(
        rename = "agentId",
        alias = "AgentId",
        alias = "agentID",
        deserialize_with = "string_or_number"
    )]
    pub agent_id: String,
    #[serde(default, alias = "PID", alias = "Pid", deserialize_with = "opt_string_or_number")]
    pub pid: Option<String>,
    #[serde(default, alias = "State", alias = "agentState")]
    pub state: String,
}

impl AgentInfo {
    pub fn agent_state(&self) -> AgentState {
        AgentState::classify(&self.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Available,
    Stopping,
    Stopped,
    Other,
}

impl AgentState {
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" | "RUNNING" => AgentState::Available,
            "STOPPING" | "STOPPING_AGENT" => AgentState::Stopping,
            "STOPPED" => AgentState::Stopped,
            _ => AgentState::Other,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionInfo {
    #[serde(
        alias = "SessionId",
        alias = "SessionID",
        alias = "sessionId",
        deserialize_with = "string_or_number"
    )]
    pub session_id: String,
    #[serde(default, alias = "SessionState", alias = "sessionState")]
    pub state: String,
    #[serde(default, alias = "SessionMemory", alias = "sessionMemory")]
    pub memory: Option<Value>,
    #[serde(
        default,
        alias = "RequestsCompleted",
        alias = "requestsCompleted",
        alias = "requestCount"
    )]
    pub completed_requests: Option<Value>,
    #[serde(default, alias = "RequestsFailed", alias = "requestsFailed")]
    pub failed_requests: Option<Value>,
}

impl SessionInfo {
    pub fn session_state(&self) -> SessionState {
        SessionState::classify(&self.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Busy,
    Other,
}

impl SessionState {
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IDLE" | "AVAILABLE" => SessionState::Idle,
            "ACTIVE" | "BUSY" | "RUNNING" | "LOCKED" | "RESERVED" => SessionState::Busy,
            _ => SessionState::Other,
        }
    }
}

/// A request currently executing inside an agent.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AgentRequest {
    #[serde(
        alias = "RequestID",
        alias = "RequestId",
        alias = "requestID",
        deserialize_with = "string_or_number"
    )]
    pub request_id: String,
    #[serde(
        default,
        alias = "SessionId",
        alias = "SessionID",
        alias = "sessionId",
        deserialize_with = "opt_string_or_number"
    )]
    pub session_id: Option<String>,
    #[serde(default, alias = "RequestProcName", alias = "requestProcName")]
    pub proc_name: Option<String>,
    #[serde(default, alias = "StartTime", alias = "startTime")]
    pub start_time: Option<String>,
}

fn value_to_id(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    value_to_id(v).ok_or_else(|| serde::de::Error::custom("expected a string or number id"))
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(value_to_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sessions_accept_both_casings_and_numeric_ids() {
        let body = json!({
            "result": {
                "AgentSession": [
                    { "SessionId": 4, "SessionState": "IDLE", "SessionMemory": 2048 },
                    { "sessionId": "5", "sessionState": "ACTIVE", "sessionMemory": 4096,
                      "RequestsCompleted": 12, "RequestsFailed": 1 }
                ]
            }
        });
        let env: Envelope<SessionList> = serde_json::from_value(body).unwrap();
        let s = env.result.sessions;
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].session_id, "4");
        assert_eq!(s[0].session_state(), SessionState::Idle);
        assert_eq!(s[0].memory, Some(json!(2048)));
        assert_eq!(s[1].session_id, "5");
        assert_eq!(s[1].session_state(), SessionState::Busy);
        assert_eq!(s[1].completed_requests, Some(json!(12)));
        assert_eq!(s[1].failed_requests, Some(json!(1)));
    }

    #[test]
    fn agents_parse_with_numeric_pid() {
        let body = json!({
            "result": { "agents": [
                { "agentId": "aXb1", "pid": 3120, "state": "AVAILABLE" },
                { "agentId": "aXb2", "pid": "3121", "state": "STOPPING" }
            ]}
        });
        let env: Envelope<AgentList> = serde_json::from_value(body).unwrap();
        let a = env.result.agents;
        assert_eq!(a[0].pid.as_deref(), Some("3120"));
        assert_eq!(a[0].agent_state(), AgentState::Available);
        assert_eq!(a[1].agent_state(), AgentState::Stopping);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let env: Envelope<RequestList> = serde_json::from_value(json!({ "result": {} })).unwrap();
        assert!(env.result.requests.is_empty());
        let env: Envelope<ApplicationList> =
            serde_json::from_value(json!({ "result": { "Application": [ { "name": "oepas1" } ] } }))
                .unwrap();
        assert_eq!(env.result.applications[0].name, "oepas1");
        assert_eq!(env.result.applications[0].version, None);
    }

    #[test]
    fn requests_parse() {
        let body = json!({ "result": { "AgentRequest": [
            { "RequestID": "ROOT:w:00000005", "SessionId": 7, "RequestProcName": "getCustomers.p" }
        ]}});
        let env: Envelope<RequestList> = serde_json::from_value(body).unwrap();
        let r = &env.result.requests[0];
        assert_eq!(r.request_id, "ROOT:w:00000005");
        assert_eq!(r.session_id.as_deref(), Some("7"));
        assert_eq!(r.proc_name.as_deref(), Some("getCustomers.p"));
    }
}
