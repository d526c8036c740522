use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{AdminInfo, Cta, Message, Role, WhatsappTimeout};

/// Special actions a caller can ask the responder to account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    RequestAdmin,
}

/// Body of a responder invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_action: Option<UserAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_takeover: Option<bool>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            session_id: session_id.into(),
            user_action: None,
            admin_takeover: None,
        }
    }

    /// Content of the most recent user entry, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .filter(|c| !c.trim().is_empty())
    }

    pub fn is_admin_takeover(&self) -> bool {
        self.admin_takeover.unwrap_or(false)
    }
}

/// Intent reported when an operator owns the conversation.
pub const ADMIN_TAKEOVER_INTENT: &str = "admin_takeover";

/// A responder answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<Cta>,
    pub confidence: f32,
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_intervention: Option<AdminInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_timeout: Option<WhatsappTimeout>,
}

impl ChatReply {
    /// Reply that deliberately says nothing because an operator is in charge.
    pub fn suppressed() -> Self {
        Self {
            intent: ADMIN_TAKEOVER_INTENT.to_string(),
            ..Default::default()
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.answer.trim().is_empty()
    }

    /// Convert into the assistant entry appended to the transcript.
    pub fn into_message(self) -> Message {
        let mut msg = Message::assistant(self.answer).with_benefits(self.benefits);
        if let Some(cta) = self.cta {
            msg = msg.with_cta(cta);
        }
        msg.admin_info = self.admin_intervention;
        msg.whatsapp_timeout = self.whatsapp_timeout;
        msg
    }
}

/// Produces answers to end-user utterances.
///
/// Implementations may fail freely; callers substitute a fallback notice.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Strategy name for logging (e.g., "faq", "llm").
    fn name(&self) -> &str;

    /// Answer the latest user utterance in `request`.
    async fn respond(&self, request: &ChatRequest) -> Result<ChatReply>;
}

/// Trait for generative model backends used by the LLM responder.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// One prior turn passed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmTurn {
    pub role: String,
    pub content: String,
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub history: Vec<LlmTurn>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
