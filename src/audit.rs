//! Append-only audit trail of envelopes received and sent.
//!
//! One JSON object per line. The field names and subject truncation are read
//! by the dashboard, so they must stay stable. Writes are best-effort: a
//! failing disk never fails the request that triggered the write.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::protocol::envelope::{current_timestamp, Envelope};

/// Maximum number of characters of a subject kept in an audit line.
pub const SUBJECT_MAX_CHARS: usize = 120;

/// Audit status of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Received,
    Sent,
    Error,
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    pub subject: String,
    pub status: AuditStatus,
}

impl AuditEntry {
    /// Snapshot an envelope. `local_agent` fills in a missing `to`.
    pub fn from_envelope(envelope: &Envelope, status: AuditStatus, local_agent: &str) -> Self {
        Self {
            ts: current_timestamp(),
            from: envelope.from_or_unknown().to_string(),
            to: envelope.to.clone().unwrap_or_else(|| local_agent.to_string()),
            message_type: envelope.type_or_unknown().to_string(),
            id: envelope.id_or_unknown().to_string(),
            subject: truncate_chars(envelope.subject(), SUBJECT_MAX_CHARS),
            status,
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Audit log writer. Appends are serialized so concurrent requests never
/// interleave partial lines.
#[derive(Debug)]
pub struct AuditSink {
    path: PathBuf,
    local_agent: String,
    write_lock: Mutex<()>,
}

impl AuditSink {
    pub fn new(path: impl Into<PathBuf>, local_agent: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            local_agent: local_agent.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Record an envelope with the given status.
    pub fn record(&self, envelope: &Envelope, status: AuditStatus) {
        let entry = AuditEntry::from_envelope(envelope, status, &self.local_agent);
        self.append(&entry);
    }

    /// Append one entry. Errors are logged and dropped.
    pub fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_append(entry) {
            tracing::warn!("Audit write to {} failed: {}", self.path.display(), e);
        }
    }

    fn try_append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
