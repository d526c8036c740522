//! Telemetry and structured logging components for Concierge.
//!
//! Handles log redaction, JSON output generation, file rotation, and chat
//! event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{ChatEvent, ChatEventLogger, EventLogEntry};
pub use logger::{init_file_logger, init_logger};
pub use redact::redact_sensitive_data;
