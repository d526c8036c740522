//! `concierge-config`: runtime configuration for Concierge.
//!
//! Provides:
//! - Typed config schema (server, store, chat timing, responder, admin)
//! - YAML loading from the config directory
//! - `${ENV_VAR}` substitution
//! - Default value application and env overrides
//! - Validation with dotted field paths
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::{apply_all_defaults, apply_env_overrides, WHATSAPP_NUMBER_ENV};
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw_config, resolve_path};
pub use redact::redact;
pub use schema::{ConciergeConfig, LlmConfig, ResponderKind};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<ConciergeConfig> {
    let raw = load_raw_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();
    let (config, report) = prepare(raw, &env)?;

    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        bail!("{} config error(s); first: {}", report.errors.len(), first);
    }
    Ok(config)
}

/// The pure part of loading: substitution, typing, defaults, overrides and
/// validation against an explicit environment.
pub fn prepare(raw: Value, env: &HashMap<String, String>) -> Result<(ConciergeConfig, ValidationReport)> {
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;
    let config: ConciergeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);
    let config = apply_env_overrides(config, env.get(WHATSAPP_NUMBER_ENV).cloned());
    let report = validate(&config);
    Ok((config, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn full_pipeline() {
        let raw = json!({
            "responder": { "kind": "llm", "llm": { "apiKey": "${OPENROUTER_API_KEY}" } },
            "contact": { "whatsappNumber": "6200" },
        });
        let (cfg, report) = prepare(
            raw,
            &env(&[("OPENROUTER_API_KEY", "sk-1"), ("WA_BUSINESS_NUMBER", "62811")]),
        )
        .unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(cfg.responder_kind(), ResponderKind::Llm);
        assert_eq!(cfg.whatsapp_number(), "62811");
        assert_eq!(cfg.poll_interval().as_secs(), 5);
    }

    #[test]
    fn wrong_types_fail_after_substitution() {
        let raw = json!({ "server": { "port": "not-a-port" } });
        assert!(prepare(raw, &HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn invalid_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "chat:\n  pollIntervalSecs: 0\n").unwrap();
        let err = load_and_prepare(&path).await.unwrap_err();
        assert!(err.to_string().contains("chat.pollIntervalSecs"));
    }
}
