//! CLI Status Command
//!
//! Asks a running server for its responder health.

use anyhow::Result;
use serde::Deserialize;

use crate::terminal_output::{note_error, note_success, note_warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Health {
    status: String,
    faq_loaded: bool,
    intents_count: usize,
}

fn describe(health: &Health) -> String {
    format!(
        "Server {} (FAQ {}, {} intents)",
        health.status,
        if health.faq_loaded { "loaded" } else { "NOT loaded" },
        health.intents_count
    )
}

pub async fn run(port: u16) -> Result<()> {
    let url = format!("http://127.0.0.1:{port}/api/chat");
    let client = reqwest::Client::new();
    match client.get(&url).send().await {
        Ok(resp) => {
            let health: Health = resp.error_for_status()?.json().await?;
            if health.faq_loaded {
                note_success(&describe(&health));
            } else {
                note_warn(&describe(&health));
            }
        }
        Err(e) => {
            note_error(&format!("Concierge is not running on port {port}: {e}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_health_body() {
        let health: Health = serde_json::from_str(
            r#"{"status":"healthy","faq_loaded":true,"intents_count":8}"#,
        )
        .unwrap();
        assert_eq!(describe(&health), "Server healthy (FAQ loaded, 8 intents)");
    }
}
