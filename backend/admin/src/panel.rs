//! Operator panel: list sessions, take them over, and write into them.
//!
//! The panel never holds a lock on a session. A takeover is just an
//! `admin-active` entry appended to the transcript the widget already
//! polls, so the widget learns about it through its normal sync path.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use concierge_core::contact::admin_joined_notice;
use concierge_core::{
    ConciergeError, EscalationPolicy, Message, Result, SessionId,
};
use concierge_logging::{ChatEvent, ChatEventLogger};
use concierge_store::{SessionRepository, Transcript, TranscriptEvent};

use crate::summary::SessionSummary;

pub const DEFAULT_SESSIONS_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub const ADMIN_ROLE: &str = "admin";

/// An authenticated panel user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
}

impl Operator {
    pub fn admin(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: "1".to_string(),
            name: "Administrator".to_string(),
            role: ADMIN_ROLE.to_string(),
            username,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ConciergeError::NotPrivileged)
        }
    }
}

#[derive(Clone)]
pub struct AdminPanel {
    repo: SessionRepository,
    policy: EscalationPolicy,
}

impl AdminPanel {
    pub fn new(repo: SessionRepository, policy: EscalationPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Every non-empty session, most recently active first.
    ///
    /// Never fails: unreadable entries are logged and skipped, and a store
    /// failure yields an empty listing for this cycle.
    pub async fn list_sessions(&self, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let ids = match self.repo.session_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to scan session keys");
                return Vec::new();
            }
        };

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_summary(&id, now).await {
                Ok(Some(summary)) => sessions.push(summary),
                Ok(None) => {}
                Err(e) => warn!(session_id = %id, error = %e, "Skipping unreadable session"),
            }
        }
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        debug!(count = sessions.len(), "Listed sessions");
        sessions
    }

    /// One session with its transcript.
    pub async fn session(&self, id: &SessionId, now: DateTime<Utc>) -> Result<SessionSummary> {
        self.load_summary(id, now)
            .await?
            .ok_or_else(|| ConciergeError::SessionNotFound(id.to_string()))
    }

    async fn load_summary(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Option<SessionSummary>> {
        let transcript = self.repo.load_transcript(id).await?;
        if transcript.is_empty() {
            return Ok(None);
        }
        let profile = match self.repo.load_profile(id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Ignoring unreadable profile");
                None
            }
        };
        Ok(SessionSummary::build(
            id.clone(),
            profile,
            transcript.messages,
            &self.policy,
            now,
        ))
    }

    /// Claim a session for `operator`.
    ///
    /// Two operators may take over the same session; both entries are kept
    /// and the second is logged.
    pub async fn take_over(&self, operator: &Operator, id: &SessionId) -> Result<Transcript> {
        operator.require_admin()?;
        let current = self.repo.load_transcript(id).await?;
        if current.is_empty() {
            return Err(ConciergeError::SessionNotFound(id.to_string()));
        }
        if current.messages.iter().any(Message::is_admin_active) {
            warn!(session_id = %id, operator = %operator.username, "Session was already taken over");
        }

        let notice = admin_joined_notice(Utc::now(), Some(operator.username.clone()));
        let transcript = self.repo.append_existing(id, notice).await?;
        ChatEventLogger::log_event(
            id.as_str(),
            ChatEvent::TakeOver {
                operator: operator.username.clone(),
            },
        );
        info!(session_id = %id, operator = %operator.username, "Session taken over");
        Ok(transcript)
    }

    /// Write an operator message into the selected session.
    pub async fn send_admin_message(
        &self,
        operator: &Operator,
        id: Option<&SessionId>,
        text: &str,
    ) -> Result<Transcript> {
        operator.require_admin()?;
        let id = id.ok_or(ConciergeError::NoSessionSelected)?;
        if text.trim().is_empty() {
            return Err(ConciergeError::validation("message must not be empty"));
        }

        let transcript = self.repo.append_existing(id, Message::admin(text)).await?;
        ChatEventLogger::log_event(
            id.as_str(),
            ChatEvent::MessageAppended {
                role: "admin".to_string(),
                content: text.to_string(),
            },
        );
        Ok(transcript)
    }

    /// Refresh the listing on a fixed period, and early whenever the store
    /// reports a write.
    pub fn watch(&self, period: Duration) -> PanelWatch {
        let (tx, rx) = watch::channel(Vec::new());
        let panel = self.clone();
        let mut hint = self.repo.hub().map(|h| h.subscribe_all());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let mut hub_gone = false;
                tokio::select! {
                    _ = ticker.tick() => {}
                    alive = next_hint(&mut hint) => hub_gone = !alive,
                }
                if hub_gone {
                    hint = None;
                }
                let sessions = panel.list_sessions(Utc::now()).await;
                if tx.send(sessions).is_err() {
                    break;
                }
            }
        });

        PanelWatch { rx, handle }
    }
}

async fn next_hint(rx: &mut Option<broadcast::Receiver<TranscriptEvent>>) -> bool {
    match rx {
        Some(rx) => !matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)),
        None => std::future::pending().await,
    }
}

/// Live session listing. Stops refreshing when dropped.
pub struct PanelWatch {
    rx: watch::Receiver<Vec<SessionSummary>>,
    handle: JoinHandle<()>,
}

impl PanelWatch {
    /// Wait for the next refresh and return it.
    pub async fn changed(&mut self) -> Option<Vec<SessionSummary>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn latest(&self) -> Vec<SessionSummary> {
        self.rx.borrow().clone()
    }
}

impl Drop for PanelWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
