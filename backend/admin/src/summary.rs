use chrono::{DateTime, Utc};
use serde::Serialize;

use concierge_core::{
    DeadlineDisplay, EscalationPolicy, Message, SessionId, SessionStatus, UserProfile,
};

/// Operator-facing view of one session, derived from its transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    pub status: SessionStatus,
    pub status_label: &'static str,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Only set while an admin request is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DeadlineDisplay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_text: Option<String>,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

impl SessionSummary {
    /// Summarise a transcript. Empty transcripts have no summary.
    pub fn build(
        id: SessionId,
        profile: Option<UserProfile>,
        messages: Vec<Message>,
        policy: &EscalationPolicy,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let created_at = messages.first()?.timestamp;
        let last_activity = messages.last()?.timestamp;
        let status = policy.derive_status(&messages, now);

        let response_deadline = match status {
            SessionStatus::AdminRequested => policy.response_deadline(&messages),
            _ => None,
        };
        let deadline = response_deadline.map(|d| policy.deadline_display(d, now));

        let display_name = match &profile {
            Some(p) => p.name.clone(),
            None => format!("User {}", id.short()),
        };

        Some(Self {
            display_name,
            profile,
            status,
            status_label: status.label(),
            created_at,
            last_activity,
            response_deadline,
            deadline_text: deadline.map(|d| d.to_string()),
            deadline,
            message_count: messages.len(),
            messages,
            id,
        })
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_urgent(&self) -> bool {
        self.deadline.is_some_and(|d| d.is_urgent())
    }
}
