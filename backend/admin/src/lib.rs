//! `concierge-admin`: the operator side of a chat session.
//!
//! Lists live sessions with their derived status, takes them over, and
//! writes operator messages into the shared transcript.

pub mod export;
pub mod panel;
pub mod summary;

pub use export::{render_html, SessionExporter};
pub use panel::{AdminPanel, Operator, PanelWatch, ADMIN_ROLE, DEFAULT_SESSIONS_POLL_INTERVAL};
pub use summary::SessionSummary;
