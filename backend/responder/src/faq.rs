//! Keyword/intent matcher over a fixed FAQ table.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use concierge_core::{ChatReply, ChatRequest, ContactLinks, Cta, CtaLink, Responder};

const BUILTIN_TABLE: &str = include_str!("../data/faq.json");

/// Intent reported when no keyword matched.
pub const UNKNOWN_INTENT: &str = "unknown";

/// An intent's answer is only used above this confidence.
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Answer content shared by intents and the fallback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqAnswer {
    pub answer: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub cta_primary: Option<String>,
    #[serde(default)]
    pub cta_secondary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqIntent {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub response: FaqAnswer,
}

/// Ordered intent table. Order matters: the first matching intent wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqTable {
    pub intents: Vec<FaqIntent>,
    pub fallback_response: FaqAnswer,
}

/// Result of classifying one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: String,
    pub confidence: f32,
}

impl FaqTable {
    /// The table bundled with the crate.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_TABLE).context("Bundled FAQ table is malformed")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read FAQ table: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse FAQ table: {}", path.display()))
    }

    pub fn intents_count(&self) -> usize {
        self.intents.len()
    }

    pub fn classify(&self, utterance: &str) -> Classification {
        let lower = utterance.to_lowercase();
        for intent in &self.intents {
            let matches = intent
                .keywords
                .iter()
                .filter(|k| lower.contains(&k.to_lowercase()))
                .count();
            if matches > 0 {
                let confidence = (matches as f32 / intent.keywords.len() as f32).min(1.0);
                return Classification {
                    intent: intent.name.clone(),
                    confidence,
                };
            }
        }
        Classification {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
        }
    }

    fn answer_for(&self, c: &Classification) -> &FaqAnswer {
        if c.confidence > CONFIDENCE_THRESHOLD {
            if let Some(intent) = self.intents.iter().find(|i| i.name == c.intent) {
                return &intent.response;
            }
        }
        &self.fallback_response
    }
}

/// Responder backed by a [`FaqTable`].
#[derive(Debug, Clone)]
pub struct FaqResponder {
    table: Option<FaqTable>,
    links: ContactLinks,
}

impl FaqResponder {
    pub fn new(table: FaqTable, links: ContactLinks) -> Self {
        Self {
            table: Some(table),
            links,
        }
    }

    /// A responder whose table failed to load. Every call errors, so callers
    /// fall back to the contact notice.
    pub fn unloaded(links: ContactLinks) -> Self {
        Self { table: None, links }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn intents_count(&self) -> usize {
        self.table.as_ref().map(FaqTable::intents_count).unwrap_or(0)
    }

    pub fn links(&self) -> &ContactLinks {
        &self.links
    }

    /// Classify `utterance` and build the reply for it.
    pub fn reply_for(&self, utterance: &str) -> Result<ChatReply> {
        let table = self.table.as_ref().context("FAQ table not loaded")?;
        let classification = table.classify(utterance);
        debug!(
            intent = %classification.intent,
            confidence = classification.confidence,
            "Intent detected"
        );
        let answer = table.answer_for(&classification);
        Ok(ChatReply {
            answer: answer.answer.clone(),
            benefits: answer.benefits.clone(),
            cta: self.build_cta(answer, &classification.intent),
            confidence: classification.confidence,
            intent: classification.intent,
            ..Default::default()
        })
    }

    fn build_cta(&self, answer: &FaqAnswer, intent: &str) -> Option<Cta> {
        let primary = answer.cta_primary.as_ref().map(|text| {
            let topic = intent.replacen('_', " ", 1);
            CtaLink::new(
                text.clone(),
                self.links.whatsapp_link_with_text(&format!(
                    "Halo, saya tertarik dengan informasi tentang {topic}"
                )),
            )
        });
        let secondary = answer.cta_secondary.as_ref().map(|text| {
            let link = if text.contains('#') { text.clone() } else { "#services".to_string() };
            CtaLink::new(text.clone(), link)
        });
        let cta = Cta { primary, secondary };
        (!cta.is_empty()).then_some(cta)
    }
}

#[async_trait]
impl Responder for FaqResponder {
    fn name(&self) -> &str {
        "faq"
    }

    async fn respond(&self, request: &ChatRequest) -> Result<ChatReply> {
        if request.is_admin_takeover() {
            return Ok(ChatReply::suppressed());
        }
        let text = request.last_user_text().context("No message provided")?;
        self.reply_for(text)
    }
}
