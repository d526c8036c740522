//! `concierge-responder`: answer generation for the chat widget.
//!
//! Two interchangeable [`Responder`](concierge_core::Responder) strategies: a
//! keyword matcher over a fixed FAQ table and an LLM-backed responder that
//! falls back to it. [`HttpResponder`] calls either one over HTTP.

pub mod fallback;
pub mod faq;
pub mod http;
pub mod llm;
pub mod providers;

pub use fallback::server_failure_reply;
pub use faq::{Classification, FaqResponder, FaqTable};
pub use http::HttpResponder;
pub use llm::{LlmResponder, LlmSettings};
pub use providers::OpenRouterProvider;
