//! Config defaults: fills unset values after loading.

use crate::schema::{
    AdminConfig, ChatConfig, ConciergeConfig, ContactConfig, LoggingConfig, RateLimitConfig,
    ResponderConfig, ResponderKind, ServerConfig, StoreConfig,
};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORE_PATH: &str = "concierge.db";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_ADMIN_RESPONSE_TIMEOUT_MINS: u64 = 15;
pub const DEFAULT_URGENT_THRESHOLD_MINS: u64 = 5;
pub const DEFAULT_SESSIONS_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_WHATSAPP_NUMBER: &str = "628123456789";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Env var that overrides `contact.whatsappNumber`.
pub const WHATSAPP_NUMBER_ENV: &str = "WA_BUSINESS_NUMBER";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ConciergeConfig) -> ConciergeConfig {
    let config = apply_server_defaults(config);
    let config = apply_chat_defaults(config);
    let config = apply_rate_limit_defaults(config);
    let config = apply_contact_defaults(config);
    let config = apply_responder_defaults(config);
    let config = apply_admin_defaults(config);
    apply_logging_defaults(config)
}

/// Override the WhatsApp number from the environment, when set.
pub fn apply_env_overrides(mut config: ConciergeConfig, number: Option<String>) -> ConciergeConfig {
    if let Some(number) = number.filter(|n| !n.trim().is_empty()) {
        config
            .contact
            .get_or_insert_with(ContactConfig::default)
            .whatsapp_number = Some(number.trim().to_string());
    }
    config
}

fn apply_server_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);

    let store = config.store.get_or_insert_with(StoreConfig::default);
    store.path.get_or_insert_with(|| DEFAULT_STORE_PATH.to_string());
    config
}

fn apply_chat_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let chat = config.chat.get_or_insert_with(ChatConfig::default);
    chat.poll_interval_secs.get_or_insert(DEFAULT_POLL_INTERVAL_SECS);
    chat.admin_response_timeout_mins
        .get_or_insert(DEFAULT_ADMIN_RESPONSE_TIMEOUT_MINS);
    chat.urgent_threshold_mins.get_or_insert(DEFAULT_URGENT_THRESHOLD_MINS);
    chat.sessions_poll_interval_secs
        .get_or_insert(DEFAULT_SESSIONS_POLL_INTERVAL_SECS);
    config
}

fn apply_rate_limit_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let rl = config.rate_limit.get_or_insert_with(RateLimitConfig::default);
    rl.max_requests.get_or_insert(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    rl.window_secs.get_or_insert(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    config
}

fn apply_contact_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let contact = config.contact.get_or_insert_with(ContactConfig::default);
    contact
        .whatsapp_number
        .get_or_insert_with(|| DEFAULT_WHATSAPP_NUMBER.to_string());
    config
}

fn apply_responder_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let responder = config.responder.get_or_insert_with(ResponderConfig::default);
    responder.kind.get_or_insert(ResponderKind::Faq);
    config
}

fn apply_admin_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let admin = config.admin.get_or_insert_with(AdminConfig::default);
    admin
        .username
        .get_or_insert_with(|| DEFAULT_ADMIN_USERNAME.to_string());
    admin.salt.get_or_insert_with(String::new);
    admin.token_ttl_hours.get_or_insert(DEFAULT_TOKEN_TTL_HOURS);
    config
}

fn apply_logging_defaults(mut config: ConciergeConfig) -> ConciergeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.dir.get_or_insert_with(|| DEFAULT_LOG_DIR.to_string());
    config
}
