//! Log Redaction Layer
//!
//! Scrubs API keys, access tokens, and phone numbers from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static INDONESIAN_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+62|\b62|\b0)[\s-]?8\d{1,2}[-.\s]?\d{3,4}[-.\s]?\d{3,5}\b").unwrap()
});
static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9\-]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Tokens first: long keys can contain digit runs that look like phones.
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = INDONESIAN_PHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]");
    TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    }

    #[test]
    fn test_indonesian_numbers() {
        for raw in [
            "hubungi saya di 081234567890",
            "nomor +62 812-3456-7890 ya",
            "WA 6281234567890",
        ] {
            let clean = redact_sensitive_data(raw);
            assert!(clean.contains("[REDACTED_PHONE]"), "{raw} -> {clean}");
            assert!(!clean.contains("3456"), "{raw} -> {clean}");
        }
    }

    #[test]
    fn test_plain_text_untouched() {
        let raw = "Apa syarat PPIU untuk 2 tahun?";
        assert_eq!(redact_sensitive_data(raw), raw);
    }

    #[test]
    fn test_openrouter_key() {
        let raw = "key=sk-or-v1-abcdefghijklmnopqrstuvwxyz0123456789";
        assert!(redact_sensitive_data(raw).contains("[REDACTED_TOKEN]"));
    }
}
