use concierge_core::contact::SERVER_FAILURE_TEXT;
use concierge_core::{ChatReply, ContactLinks};

/// Intent reported on the failure reply.
pub const ERROR_INTENT: &str = "error";

pub const FAILURE_BENEFITS: [&str; 3] = ["Respon cepat", "Layanan 24/7", "Konsultasi gratis"];

/// Complete reply returned when answering failed on the server side.
pub fn server_failure_reply(links: &ContactLinks) -> ChatReply {
    ChatReply {
        answer: SERVER_FAILURE_TEXT.to_string(),
        benefits: FAILURE_BENEFITS.iter().map(|b| b.to_string()).collect(),
        cta: Some(links.contact_cta()),
        confidence: 0.0,
        intent: ERROR_INTENT.to_string(),
        ..Default::default()
    }
}
