//! Concierge runtime configuration schema.
//!
//! Every field is optional in the file. [`crate::defaults`] fills the gaps
//! and the accessors on [`ConciergeConfig`] fall back to the same constants,
//! so callers never see a missing value.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConciergeConfig {
    /// HTTP listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Shared session store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    /// Widget and panel timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,

    /// Responder endpoint rate limiting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Direct-contact details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactConfig>,

    /// Answer generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<ResponderConfig>,

    /// Admin panel credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// SQLite file. Relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_response_timeout_mins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent_threshold_mins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    #[default]
    Faq,
    Llm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResponderKind>,
    /// FAQ table file; the built-in table is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faq_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Hex SHA-256 of `salt` followed by the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ttl_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

impl ConciergeConfig {
    pub fn bind_address(&self) -> String {
        let server = self.server.as_ref();
        let bind = server
            .and_then(|s| s.bind.as_deref())
            .unwrap_or(DEFAULT_BIND);
        let port = server.and_then(|s| s.port).unwrap_or(DEFAULT_PORT);
        format!("{bind}:{port}")
    }

    pub fn store_path(&self) -> &str {
        self.store
            .as_ref()
            .and_then(|s| s.path.as_deref())
            .unwrap_or(DEFAULT_STORE_PATH)
    }

    fn chat(&self) -> ChatConfig {
        self.chat.clone().unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.chat().poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn admin_response_timeout_mins(&self) -> u64 {
        self.chat()
            .admin_response_timeout_mins
            .unwrap_or(DEFAULT_ADMIN_RESPONSE_TIMEOUT_MINS)
    }

    pub fn urgent_threshold_mins(&self) -> u64 {
        self.chat()
            .urgent_threshold_mins
            .unwrap_or(DEFAULT_URGENT_THRESHOLD_MINS)
    }

    pub fn sessions_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.chat()
                .sessions_poll_interval_secs
                .unwrap_or(DEFAULT_SESSIONS_POLL_INTERVAL_SECS),
        )
    }

    pub fn rate_limit_max_requests(&self) -> u32 {
        self.rate_limit
            .as_ref()
            .and_then(|r| r.max_requests)
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(
            self.rate_limit
                .as_ref()
                .and_then(|r| r.window_secs)
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        )
    }

    pub fn whatsapp_number(&self) -> &str {
        self.contact
            .as_ref()
            .and_then(|c| c.whatsapp_number.as_deref())
            .unwrap_or(DEFAULT_WHATSAPP_NUMBER)
    }

    pub fn responder_kind(&self) -> ResponderKind {
        self.responder
            .as_ref()
            .and_then(|r| r.kind)
            .unwrap_or_default()
    }

    pub fn admin_username(&self) -> &str {
        self.admin
            .as_ref()
            .and_then(|a| a.username.as_deref())
            .unwrap_or(DEFAULT_ADMIN_USERNAME)
    }

    pub fn token_ttl_hours(&self) -> u64 {
        self.admin
            .as_ref()
            .and_then(|a| a.token_ttl_hours)
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
