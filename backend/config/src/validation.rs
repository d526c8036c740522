//! Config validation: collects every problem in one pass, with dotted paths.

use thiserror::Error;

use crate::schema::{ConciergeConfig, ResponderKind};

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &ConciergeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_chat(config, &mut report);
    validate_rate_limit(config, &mut report);
    validate_contact(config, &mut report);
    validate_responder(config, &mut report);
    validate_admin(config, &mut report);
    report
}

fn validate_server(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if server.port == Some(0) {
        report.error("server.port", "port must be > 0");
    }
    if let Some(bind) = &server.bind {
        if bind.parse::<std::net::IpAddr>().is_err() {
            report.error("server.bind", format!("'{bind}' is not an IP address"));
        }
    }
}

fn validate_chat(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(chat) = &config.chat else { return };
    if chat.poll_interval_secs == Some(0) {
        report.error("chat.pollIntervalSecs", "poll interval must be >= 1 second");
    }
    if chat.sessions_poll_interval_secs == Some(0) {
        report.error("chat.sessionsPollIntervalSecs", "poll interval must be >= 1 second");
    }
    if chat.admin_response_timeout_mins == Some(0) {
        report.error("chat.adminResponseTimeoutMins", "admin response timeout must be >= 1 minute");
    }
    if let (Some(urgent), Some(timeout)) = (chat.urgent_threshold_mins, chat.admin_response_timeout_mins) {
        if urgent >= timeout {
            report.warn(
                "chat.urgentThresholdMins",
                "urgent threshold is not below the response timeout; every request shows as urgent",
            );
        }
    }
}

fn validate_rate_limit(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(rl) = &config.rate_limit else { return };
    if rl.max_requests == Some(0) {
        report.error("rateLimit.maxRequests", "maxRequests must be >= 1");
    }
    if rl.window_secs == Some(0) {
        report.error("rateLimit.windowSecs", "windowSecs must be >= 1");
    }
}

fn validate_contact(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(number) = config.contact.as_ref().and_then(|c| c.whatsapp_number.as_deref()) else {
        return;
    };
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        report.warn(
            "contact.whatsappNumber",
            format!("'{number}' is not digits only; wa.me links may not open"),
        );
    }
}

fn validate_responder(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(responder) = &config.responder else { return };
    if responder.kind != Some(ResponderKind::Llm) {
        return;
    }
    let api_key = responder.llm.as_ref().and_then(|l| l.api_key.as_deref());
    if api_key.map(str::is_empty).unwrap_or(true) {
        report.error("responder.llm.apiKey", "an API key is required when kind is 'llm'");
    }
    if let Some(t) = responder.llm.as_ref().and_then(|l| l.temperature) {
        if !(0.0..=2.0).contains(&t) {
            report.error("responder.llm.temperature", "temperature must be within 0.0..=2.0");
        }
    }
}

fn validate_admin(config: &ConciergeConfig, report: &mut ValidationReport) {
    let Some(admin) = &config.admin else { return };
    let Some(hash) = admin.password_hash.as_deref() else {
        report.warn("admin.passwordHash", "no password hash configured; admin login is disabled");
        return;
    };
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        report.error("admin.passwordHash", "expected a hex SHA-256 digest (64 characters)");
    }
    if admin.token_secret.as_deref().map(str::is_empty).unwrap_or(true) {
        report.error("admin.tokenSecret", "a token secret is required when a password hash is set");
    }
    if admin.token_ttl_hours == Some(0) {
        report.error("admin.tokenTtlHours", "token lifetime must be >= 1 hour");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{AdminConfig, ChatConfig, ContactConfig, LlmConfig, ResponderConfig, ServerConfig};

    #[test]
    fn defaulted_config_is_valid() {
        let report = validate(&apply_all_defaults(ConciergeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert_eq!(report.warnings[0].path, "admin.passwordHash");
    }

    #[test]
    fn zero_values_are_errors() {
        let mut cfg = ConciergeConfig::default();
        cfg.server = Some(ServerConfig { port: Some(0), ..Default::default() });
        cfg.chat = Some(ChatConfig {
            poll_interval_secs: Some(0),
            admin_response_timeout_mins: Some(0),
            ..Default::default()
        });
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"server.port"));
        assert!(paths.contains(&"chat.pollIntervalSecs"));
        assert!(paths.contains(&"chat.adminResponseTimeoutMins"));
    }

    #[test]
    fn llm_without_api_key_is_error() {
        let mut cfg = ConciergeConfig::default();
        cfg.responder = Some(ResponderConfig {
            kind: Some(ResponderKind::Llm),
            llm: Some(LlmConfig::default()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert_eq!(report.errors[0].path, "responder.llm.apiKey");
    }

    #[test]
    fn password_hash_requires_token_secret() {
        let mut cfg = ConciergeConfig::default();
        cfg.admin = Some(AdminConfig {
            password_hash: Some("a".repeat(64)),
            token_secret: Some(String::new()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "admin.tokenSecret");
    }

    #[test]
    fn non_numeric_whatsapp_number_is_only_a_warning() {
        let mut cfg = ConciergeConfig::default();
        cfg.contact = Some(ContactConfig { whatsapp_number: Some("+62 811".into()) });
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "contact.whatsappNumber");
    }
}
