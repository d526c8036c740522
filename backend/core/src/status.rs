//! Session status derivation.
//!
//! Status is never stored. It is recomputed from the transcript on every read
//! so the widget and the admin panel can never disagree about the same
//! transcript. Precedence: an `admin-active` entry anywhere wins; otherwise
//! the latest admin request decides by its response deadline; otherwise an
//! explicit WhatsApp timeout entry; otherwise `ai-only`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Default admin response window.
pub const DEFAULT_ADMIN_RESPONSE_MINS: i64 = 15;

/// Default remaining-minutes threshold under which a deadline is urgent.
pub const DEFAULT_URGENT_THRESHOLD_MINS: i64 = 5;

/// Derived state of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    AiOnly,
    AdminRequested,
    AdminActive,
    WhatsappFallback,
}

impl SessionStatus {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::AiOnly => "AI Only",
            SessionStatus::AdminRequested => "Menunggu Admin",
            SessionStatus::AdminActive => "Admin Aktif",
            SessionStatus::WhatsappFallback => "WhatsApp Fallback",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::AiOnly => "ai-only",
            SessionStatus::AdminRequested => "admin-requested",
            SessionStatus::AdminActive => "admin-active",
            SessionStatus::WhatsappFallback => "whatsapp-fallback",
        };
        write!(f, "{}", s)
    }
}

/// Timing knobs shared by the widget countdown and the panel deadline display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub response_window: Duration,
    pub urgent_threshold: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            response_window: Duration::minutes(DEFAULT_ADMIN_RESPONSE_MINS),
            urgent_threshold: Duration::minutes(DEFAULT_URGENT_THRESHOLD_MINS),
        }
    }
}

impl EscalationPolicy {
    pub fn new(response_window_mins: i64, urgent_threshold_mins: i64) -> Self {
        Self {
            response_window: Duration::minutes(response_window_mins),
            urgent_threshold: Duration::minutes(urgent_threshold_mins),
        }
    }

    /// Derive the status of `messages` as of `now`.
    pub fn derive_status(&self, messages: &[Message], now: DateTime<Utc>) -> SessionStatus {
        if messages.iter().any(Message::is_admin_active) {
            return SessionStatus::AdminActive;
        }
        if let Some(deadline) = self.response_deadline(messages) {
            return if now >= deadline {
                SessionStatus::WhatsappFallback
            } else {
                SessionStatus::AdminRequested
            };
        }
        if messages.iter().any(Message::is_whatsapp_fallback) {
            return SessionStatus::WhatsappFallback;
        }
        SessionStatus::AiOnly
    }

    /// Deadline of the most recent pending admin request.
    ///
    /// `None` when no request exists or an admin already took over.
    pub fn response_deadline(&self, messages: &[Message]) -> Option<DateTime<Utc>> {
        if messages.iter().any(Message::is_admin_active) {
            return None;
        }
        latest_admin_request(messages).map(|at| at + self.response_window)
    }

    /// Remaining-time display for a deadline.
    pub fn deadline_display(&self, deadline: DateTime<Utc>, now: DateTime<Utc>) -> DeadlineDisplay {
        let minutes = (deadline - now).num_minutes();
        if minutes <= 0 {
            DeadlineDisplay::PastDeadline
        } else {
            DeadlineDisplay::Remaining {
                minutes,
                urgent: minutes <= self.urgent_threshold.num_minutes(),
            }
        }
    }
}

/// Timestamp of the latest admin request in a transcript.
pub fn latest_admin_request(messages: &[Message]) -> Option<DateTime<Utc>> {
    messages.iter().rev().find_map(Message::admin_request_time)
}

/// Remaining time until an admin must answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadlineDisplay {
    Remaining { minutes: i64, urgent: bool },
    PastDeadline,
}

impl DeadlineDisplay {
    pub fn is_urgent(&self) -> bool {
        match self {
            DeadlineDisplay::Remaining { urgent, .. } => *urgent,
            DeadlineDisplay::PastDeadline => true,
        }
    }
}

impl std::fmt::Display for DeadlineDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadlineDisplay::PastDeadline => write!(f, "Sudah lewat deadline"),
            DeadlineDisplay::Remaining { minutes, urgent: true } => {
                write!(f, "{} menit lagi ⚠️", minutes)
            }
            DeadlineDisplay::Remaining { minutes, urgent: false } => write!(f, "{} menit", minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AdminInfo, WhatsappTimeout};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn request_at(at: DateTime<Utc>) -> Message {
        Message::assistant("request")
            .with_timestamp(at)
            .with_admin_info(AdminInfo::requested(at))
    }

    fn takeover_at(at: DateTime<Utc>) -> Message {
        Message::assistant("joined")
            .with_timestamp(at)
            .with_admin_info(AdminInfo::active(at, None))
    }

    #[test]
    fn plain_transcript_is_ai_only() {
        let policy = EscalationPolicy::default();
        let msgs = vec![Message::user("Halo"), Message::assistant("Hai")];
        assert_eq!(policy.derive_status(&msgs, t0()), SessionStatus::AiOnly);
        assert_eq!(policy.derive_status(&[], t0()), SessionStatus::AiOnly);
    }

    #[test]
    fn derivation_is_repeatable() {
        let policy = EscalationPolicy::default();
        let msgs = vec![Message::user("Halo"), request_at(t0())];
        let now = t0() + Duration::minutes(3);
        assert_eq!(policy.derive_status(&msgs, now), policy.derive_status(&msgs, now));
    }

    #[test]
    fn admin_active_wins_in_any_order() {
        let policy = EscalationPolicy::default();
        let now = t0() + Duration::hours(2);
        let before = vec![request_at(t0()), takeover_at(t0() + Duration::minutes(1))];
        let after = vec![takeover_at(t0()), request_at(t0() + Duration::minutes(1))];
        assert_eq!(policy.derive_status(&before, now), SessionStatus::AdminActive);
        assert_eq!(policy.derive_status(&after, now), SessionStatus::AdminActive);
    }

    #[test]
    fn request_expires_exactly_at_deadline() {
        let policy = EscalationPolicy::default();
        let msgs = vec![request_at(t0())];
        assert_eq!(policy.derive_status(&msgs, t0()), SessionStatus::AdminRequested);
        let just_before = t0() + Duration::minutes(15) - Duration::milliseconds(1);
        assert_eq!(policy.derive_status(&msgs, just_before), SessionStatus::AdminRequested);
        let at_deadline = t0() + Duration::minutes(15);
        assert_eq!(policy.derive_status(&msgs, at_deadline), SessionStatus::WhatsappFallback);
        assert_eq!(
            policy.derive_status(&msgs, at_deadline + Duration::days(1)),
            SessionStatus::WhatsappFallback
        );
    }

    #[test]
    fn latest_request_restarts_window() {
        let policy = EscalationPolicy::default();
        let second = t0() + Duration::minutes(20);
        let msgs = vec![request_at(t0()), request_at(second)];
        let now = second + Duration::minutes(1);
        assert_eq!(policy.derive_status(&msgs, now), SessionStatus::AdminRequested);
        assert_eq!(policy.response_deadline(&msgs), Some(second + Duration::minutes(15)));
    }

    #[test]
    fn explicit_timeout_without_request_is_fallback() {
        let policy = EscalationPolicy::default();
        let msg = Message::assistant("wa").with_whatsapp_timeout(WhatsappTimeout {
            enabled: true,
            triggered_at: t0(),
            link: "https://wa.me/1".into(),
        });
        assert_eq!(policy.derive_status(&[msg], t0()), SessionStatus::WhatsappFallback);
    }

    #[test]
    fn no_deadline_once_taken_over() {
        let policy = EscalationPolicy::default();
        let msgs = vec![request_at(t0()), takeover_at(t0())];
        assert_eq!(policy.response_deadline(&msgs), None);
    }

    #[test]
    fn deadline_display_thresholds() {
        let policy = EscalationPolicy::default();
        let deadline = t0() + Duration::minutes(15);
        assert_eq!(
            policy.deadline_display(deadline, t0()),
            DeadlineDisplay::Remaining { minutes: 15, urgent: false }
        );
        let d = policy.deadline_display(deadline, t0() + Duration::minutes(10));
        assert_eq!(d, DeadlineDisplay::Remaining { minutes: 5, urgent: true });
        assert_eq!(d.to_string(), "5 menit lagi ⚠️");
        let past = policy.deadline_display(deadline, deadline + Duration::seconds(1));
        assert_eq!(past, DeadlineDisplay::PastDeadline);
        assert_eq!(past.to_string(), "Sudah lewat deadline");
        // Less than a full minute left rounds down to zero.
        assert_eq!(
            policy.deadline_display(deadline, deadline - Duration::seconds(30)),
            DeadlineDisplay::PastDeadline
        );
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(SessionStatus::WhatsappFallback).unwrap(),
            "whatsapp-fallback"
        );
        assert_eq!(SessionStatus::AdminRequested.to_string(), "admin-requested");
    }
}
