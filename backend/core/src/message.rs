use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConciergeError, Result};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user typing into the widget.
    User,
    /// The responder, or a system-style notice rendered as the assistant.
    Assistant,
    /// A human operator writing from the admin panel.
    Admin,
    /// Plain system notice.
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Admin => "admin",
            Role::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// One call-to-action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtaLink {
    pub text: String,
    pub link: String,
}

impl CtaLink {
    pub fn new(text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: link.into(),
        }
    }
}

/// Primary/secondary call-to-action pair attached to an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<CtaLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<CtaLink>,
}

impl Cta {
    pub fn primary(link: CtaLink) -> Self {
        Self {
            primary: Some(link),
            secondary: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }
}

/// Escalation stage recorded on a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminStatus {
    AdminRequested,
    AdminActive,
}

/// Admin-intervention annotation. Written by the widget on request and by the
/// panel on takeover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInfo {
    pub status: AdminStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeover_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl AdminInfo {
    pub fn requested(at: DateTime<Utc>) -> Self {
        Self {
            status: AdminStatus::AdminRequested,
            request_time: Some(at),
            takeover_time: None,
            operator: None,
        }
    }

    pub fn active(at: DateTime<Utc>, operator: Option<String>) -> Self {
        Self {
            status: AdminStatus::AdminActive,
            request_time: None,
            takeover_time: Some(at),
            operator,
        }
    }
}

/// Annotation left when the admin response window elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappTimeout {
    pub enabled: bool,
    pub triggered_at: DateTime<Utc>,
    pub link: String,
}

/// A single transcript entry.
///
/// The serialized shape is the stored format under `chatMessages_{id}`, so
/// every optional annotation is skipped when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<Cta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_info: Option<AdminInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_timeout: Option<WhatsappTimeout>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("m_{}", Uuid::new_v4().simple()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            benefits: None,
            cta: None,
            admin_info: None,
            whatsapp_timeout: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn admin(content: impl Into<String>) -> Self {
        Self::new(Role::Admin, content)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach benefit bullets. An empty list is stored as absent.
    pub fn with_benefits(mut self, benefits: Vec<String>) -> Self {
        self.benefits = if benefits.is_empty() { None } else { Some(benefits) };
        self
    }

    pub fn with_cta(mut self, cta: Cta) -> Self {
        self.cta = if cta.is_empty() { None } else { Some(cta) };
        self
    }

    pub fn with_admin_info(mut self, info: AdminInfo) -> Self {
        self.admin_info = Some(info);
        self
    }

    pub fn with_whatsapp_timeout(mut self, timeout: WhatsappTimeout) -> Self {
        self.whatsapp_timeout = Some(timeout);
        self
    }

    pub fn is_admin_active(&self) -> bool {
        matches!(
            self.admin_info,
            Some(AdminInfo {
                status: AdminStatus::AdminActive,
                ..
            })
        )
    }

    /// The instant an admin request was made, if this entry is one.
    pub fn admin_request_time(&self) -> Option<DateTime<Utc>> {
        match &self.admin_info {
            Some(info) if info.status == AdminStatus::AdminRequested => {
                Some(info.request_time.unwrap_or(self.timestamp))
            }
            _ => None,
        }
    }

    pub fn is_whatsapp_fallback(&self) -> bool {
        self.whatsapp_timeout.as_ref().is_some_and(|t| t.enabled)
    }
}

/// Identity captured by the widget's profile form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Build a profile from raw form input.
    ///
    /// Fields are trimmed. Name and company must be non-empty afterwards; a
    /// blank phone is dropped.
    pub fn from_form(name: &str, company: &str, phone: Option<&str>) -> Result<Self> {
        let name = name.trim();
        let company = company.trim();
        if name.is_empty() {
            return Err(ConciergeError::validation("name is required"));
        }
        if company.is_empty() {
            return Err(ConciergeError::validation("company is required"));
        }
        let phone = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        Ok(Self {
            name: name.to_string(),
            company: company.to_string(),
            phone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_shape_uses_camel_case_annotations() {
        let msg = Message::assistant("Admin telah bergabung")
            .with_admin_info(AdminInfo::active(Utc::now(), Some("ops".into())));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["adminInfo"]["status"], "admin-active");
        assert!(json["adminInfo"]["takeoverTime"].is_string());
        assert!(json.get("benefits").is_none());
        assert!(json.get("whatsappTimeout").is_none());
    }

    #[test]
    fn test_parses_minimal_stored_entry() {
        let raw = r#"{"id":"1","role":"user","content":"Halo","timestamp":"2024-05-01T10:00:00Z"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.role, Role::User);
        assert!(msg.admin_info.is_none());
        assert!(!msg.is_admin_active());
    }

    #[test]
    fn test_admin_request_time_falls_back_to_timestamp() {
        let at = Utc::now();
        let mut msg = Message::assistant("request").with_timestamp(at);
        msg.admin_info = Some(AdminInfo {
            status: AdminStatus::AdminRequested,
            request_time: None,
            takeover_time: None,
            operator: None,
        });
        assert_eq!(msg.admin_request_time(), Some(at));
    }

    #[test]
    fn test_empty_benefits_are_dropped() {
        let msg = Message::assistant("x").with_benefits(vec![]);
        assert!(msg.benefits.is_none());
    }

    #[test]
    fn test_profile_form_trims_and_validates() {
        let p = UserProfile::from_form("  Budi ", " PT X ", Some("   ")).unwrap();
        assert_eq!(p.name, "Budi");
        assert_eq!(p.company, "PT X");
        assert!(p.phone.is_none());

        let err = UserProfile::from_form("Budi", "   ", None).unwrap_err();
        assert!(matches!(err, ConciergeError::Validation(_)));
    }
}
