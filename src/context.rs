//! Shared context for conversation follow-ups.
//!
//! Renders the prior rounds of a multi-agent conversation file as plain text
//! that can be prepended to a follow-up prompt.

use std::path::Path;

use serde::Deserialize;

use crate::audit::truncate_chars;
use crate::error::Result;

const QUESTION_MAX_CHARS: usize = 200;
const RESPONSE_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub rounds: Vec<Round>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Round {
    pub status: Option<String>,
    pub question: Option<String>,
    #[serde(default)]
    pub responses: Vec<RoundResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundResponse {
    pub agent: Option<String>,
    pub from: Option<String>,
    pub body: Option<String>,
    pub summary: Option<String>,
}

impl RoundResponse {
    fn speaker(&self) -> &str {
        self.agent
            .as_deref()
            .or(self.from.as_deref())
            .unwrap_or("?")
    }

    fn text(&self) -> &str {
        self.body
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or_default()
    }
}

/// Load a conversation file. A missing file is `Ok(None)`.
pub fn load_conversation(path: &Path) -> Result<Option<Conversation>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Format prior rounds; `None` when there are none.
pub fn format_conversation(conv: &Conversation) -> Option<String> {
    if conv.rounds.is_empty() {
        return None;
    }

    let mut lines = vec![
        "📋 CONVERSATION CONTEXT (prior rounds):".to_string(),
        format!(
            "Conversation: {}",
            conv.conversation_id.as_deref().unwrap_or("?")
        ),
        format!("Participants: {}", conv.participants.join(", ")),
        String::new(),
    ];

    for (i, round) in conv.rounds.iter().enumerate() {
        lines.push(format!(
            "── Round {} ({}) ──",
            i + 1,
            round.status.as_deref().unwrap_or("?")
        ));
        lines.push(format!(
            "Q: {}",
            truncate_chars(round.question.as_deref().unwrap_or("?"), QUESTION_MAX_CHARS)
        ));
        for resp in &round.responses {
            lines.push(format!(
                "  {}: {}",
                resp.speaker(),
                truncate_chars(resp.text(), RESPONSE_MAX_CHARS)
            ));
        }
        if round.responses.is_empty() {
            lines.push("  (no responses yet)".to_string());
        }
        lines.push(String::new());
    }

    Some(lines.join("\n"))
}
