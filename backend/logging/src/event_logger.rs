//! Chat Event Logger
//!
//! Structured chat lifecycle events written through `tracing` under the
//! `chat_events` target, so the JSON file layer turns them into NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageAppended { role: String, content: String },
    ProfileCaptured { name: String, company: String },
    AdminRequested,
    TakeOver { operator: String },
    FallbackFired,
    ResponderFailed { error_msg: String },
}

impl ChatEvent {
    fn redacted(mut self) -> Self {
        match &mut self {
            ChatEvent::MessageAppended { content, .. } => {
                *content = redact_sensitive_data(content);
            }
            ChatEvent::ProfileCaptured { name, company } => {
                *name = redact_sensitive_data(name);
                *company = redact_sensitive_data(company);
            }
            ChatEvent::ResponderFailed { error_msg } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            ChatEvent::AdminRequested | ChatEvent::TakeOver { .. } | ChatEvent::FallbackFired => {}
        }
        self
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChatEvent,
}

impl EventLogEntry {
    pub fn new(session_id: &str, event: ChatEvent) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }
}

pub struct ChatEventLogger;

impl ChatEventLogger {
    /// Redact and emit one chat event.
    pub fn log_event(session_id: &str, event: ChatEvent) {
        let entry = EventLogEntry::new(session_id, event);
        let json = serde_json::to_string(&entry.event).unwrap_or_default();
        info!(target: "chat_events", session_id = %entry.session_id, event = %json, "Chat event");
    }
}
