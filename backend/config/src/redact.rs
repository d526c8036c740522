//! Safe-to-print config snapshots: secrets and phone numbers are masked.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "passwordHash",
    "password_hash",
    "password",
    "salt",
    "tokenSecret",
    "token_secret",
    "token",
    "secret",
];

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").unwrap());

/// Mask every sensitive string in a config tree.
pub fn redact(value: &Value) -> Value {
    redact_under(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    let head: String = s.chars().take(4).collect();
    if s.chars().count() > 4 {
        format!("{head}***")
    } else {
        "***".to_string()
    }
}

fn redact_under(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if !s.is_empty() && (is_sensitive_key(key) || PHONE_PATTERN.is_match(s)) => {
            Value::String(mask(s))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_under(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_under(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}
