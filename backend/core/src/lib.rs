//! `concierge-core`: shared chat model for the Concierge hand-off service.
//!
//! Transcript entries, the session key convention, status derivation, and
//! the responder traits used by the widget, the admin panel and the gateway.

pub mod contact;
pub mod error;
pub mod message;
pub mod session;
pub mod status;
pub mod traits;

pub use contact::ContactLinks;
pub use error::{ConciergeError, Result};
pub use message::{AdminInfo, AdminStatus, Cta, CtaLink, Message, Role, UserProfile, WhatsappTimeout};
pub use session::SessionId;
pub use status::{DeadlineDisplay, EscalationPolicy, SessionStatus};
pub use traits::{
    ChatReply, ChatRequest, LlmProvider, LlmRequest, LlmResponse, LlmTurn, Responder, UserAction,
};
