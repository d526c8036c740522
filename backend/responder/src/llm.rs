//! Generative responder with the FAQ matcher as fallback.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use concierge_core::{
    ChatReply, ChatRequest, LlmProvider, LlmRequest, LlmTurn, Message, Responder, Role,
};

use crate::faq::FaqResponder;

/// Prior turns sent along with the question.
pub const HISTORY_LIMIT: usize = 10;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

pub const SYSTEM_PROMPT: &str = "Anda adalah asisten digital PT Jaminan Solusi Bisnis, \
konsultan perizinan dan layanan bisnis di Indonesia. Layanan kami: izin travel \
(PPIU, PIHK, akreditasi, lisensi IATA) dan layanan bisnis (pajak, bank garansi, \
laporan keuangan, cek kelayakan perusahaan). Jawab dalam Bahasa Indonesia yang \
sopan, ringkas (maksimal 4 kalimat), dan akurat. Jangan mengarang biaya atau \
tenggat resmi. Bila pertanyaan di luar layanan kami atau butuh detail kasus, \
sarankan pengguna menghubungi tim kami via WhatsApp.";

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

pub struct LlmResponder {
    provider: Arc<dyn LlmProvider>,
    faq: FaqResponder,
    settings: LlmSettings,
}

impl LlmResponder {
    pub fn new(provider: Arc<dyn LlmProvider>, faq: FaqResponder, settings: LlmSettings) -> Self {
        Self {
            provider,
            faq,
            settings,
        }
    }

    pub fn faq(&self) -> &FaqResponder {
        &self.faq
    }

    fn build_request(&self, history: &[Message], question: &str) -> LlmRequest {
        let turns: Vec<LlmTurn> = history
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant | Role::Admin => "assistant",
                    Role::System => return None,
                };
                (!m.content.trim().is_empty()).then(|| LlmTurn {
                    role: role.to_string(),
                    content: m.content.clone(),
                })
            })
            .collect();
        let skip = turns.len().saturating_sub(HISTORY_LIMIT);

        LlmRequest {
            model: self.settings.model.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            history: turns.into_iter().skip(skip).collect(),
            user_prompt: question.to_string(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    fn name(&self) -> &str {
        "llm"
    }

    async fn respond(&self, request: &ChatRequest) -> Result<ChatReply> {
        if request.is_admin_takeover() {
            return Ok(ChatReply::suppressed());
        }

        let question_idx = request
            .messages
            .iter()
            .rposition(|m| m.role == Role::User && !m.content.trim().is_empty())
            .context("No message provided")?;
        let question = request.messages[question_idx].content.as_str();

        // Classification supplies intent, benefits and CTA either way.
        let faq_reply = self.faq.reply_for(question);

        let llm_request = self.build_request(&request.messages[..question_idx], question);
        match self.provider.complete(&llm_request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                info!(
                    provider = %response.provider,
                    tokens = response.tokens_used,
                    latency_ms = response.latency_ms,
                    "LLM answered"
                );
                let mut reply = faq_reply.unwrap_or_default();
                reply.answer = response.content.trim().to_string();
                if reply.intent.is_empty() {
                    reply.intent = "llm".to_string();
                }
                Ok(reply)
            }
            Ok(_) => {
                warn!(provider = %self.provider.name(), "LLM returned empty answer, using FAQ");
                faq_reply
            }
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "LLM failed, using FAQ");
                faq_reply
            }
        }
    }
}
