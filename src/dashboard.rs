//! Read-side aggregation over the audit log and external state files.
//!
//! Nothing here writes. Missing or malformed inputs produce empty sections,
//! never errors, so the dashboard always renders.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::MeshPaths;

/// Number of trailing audit lines considered.
pub const AUDIT_TAIL: usize = 200;

const CIRCUIT_BREAKERS_FILE: &str = "circuit-breakers.json";
const DEAD_LETTERS_FILE: &str = "dead-letters.json";
const INCIDENTS_FILE: &str = "active-incidents.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentCounts {
    pub sent: u64,
    pub received: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshStats {
    pub total_sent: u64,
    pub total_received: u64,
    pub total_failed: u64,
    /// Keyed by the entry's `to` agent.
    pub by_agent: BTreeMap<String, AgentCounts>,
    pub by_type: BTreeMap<String, u64>,
    pub last24h: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSnapshot {
    pub messages: Vec<Value>,
    pub stats: MeshStats,
    pub circuit_breakers: Value,
    pub dead_letters: Vec<Value>,
    pub incidents: Vec<Value>,
    pub registry: Map<String, Value>,
}

impl Default for MeshSnapshot {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            stats: MeshStats::default(),
            circuit_breakers: Value::Object(Map::new()),
            dead_letters: Vec::new(),
            incidents: Vec::new(),
            registry: Map::new(),
        }
    }
}

pub fn collect(paths: &MeshPaths) -> MeshSnapshot {
    collect_at(paths, Utc::now())
}

/// Collect a snapshot as of `now` (used for the 24-hour window).
pub fn collect_at(paths: &MeshPaths, now: DateTime<Utc>) -> MeshSnapshot {
    let mut snapshot = MeshSnapshot::default();

    if let Some(Value::Object(agents)) = read_json(&paths.registry()).and_then(|v| field(v, "agents")) {
        snapshot.registry = agents;
    }

    snapshot.messages = read_audit_tail(&paths.audit_log(), AUDIT_TAIL);
    snapshot.stats = compute_stats(&snapshot.messages, now);

    let state = paths.state_dir();
    if let Some(breakers) = read_json(&state.join(CIRCUIT_BREAKERS_FILE)) {
        snapshot.circuit_breakers = breakers;
    }
    if let Some(Value::Array(items)) = read_json(&state.join(DEAD_LETTERS_FILE)).and_then(|v| field(v, "messages")) {
        snapshot.dead_letters = items;
    }
    if let Some(Value::Array(items)) = read_json(&state.join(INCIDENTS_FILE)).and_then(|v| field(v, "incidents")) {
        snapshot.incidents = items;
    }

    snapshot
}

/// Count entries by status, recipient and type.
pub fn compute_stats(messages: &[Value], now: DateTime<Utc>) -> MeshStats {
    let mut stats = MeshStats::default();
    let day_ago = now - Duration::hours(24);

    for msg in messages {
        let status = str_field(msg, "status").unwrap_or("unknown");
        let msg_type = str_field(msg, "type").unwrap_or("unknown");
        let to_agent = str_field(msg, "to").unwrap_or("unknown");

        let counts = stats.by_agent.entry(to_agent.to_string()).or_default();
        if status == "sent" {
            stats.total_sent += 1;
            counts.sent += 1;
        } else if status == "received" {
            stats.total_received += 1;
            counts.received += 1;
        } else if status.contains("error") || status.contains("fail") {
            stats.total_failed += 1;
            counts.failed += 1;
        }

        *stats.by_type.entry(msg_type.to_string()).or_insert(0) += 1;

        let recent = str_field(msg, "ts")
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc) > day_ago)
            .unwrap_or(false);
        if recent {
            stats.last24h += 1;
        }
    }

    stats
}

/// Last `limit` parseable lines of a JSON-lines file.
pub fn read_audit_tail(path: &Path, limit: usize) -> Vec<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Audit log {} unavailable: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut messages: Vec<Value> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    let skip = messages.len().saturating_sub(limit);
    messages.drain(..skip);
    messages
}

fn read_json(path: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

fn field(mut value: Value, key: &str) -> Option<Value> {
    value.as_object_mut()?.remove(key)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
