//! `concierge-widget`: the end-user side of a chat session.

pub mod state;
pub mod widget;

pub use state::WidgetState;
pub use widget::{ChatWidget, WidgetConfig, DEFAULT_POLL_INTERVAL, SUGGESTED_PROMPTS};
