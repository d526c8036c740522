//! `concierge-store`: the shared session store.
//!
//! A versioned key/value abstraction with in-memory and SQLite backends, a
//! typed transcript repository on top, and a broadcast hub that pushes
//! transcript changes to watchers.

pub mod hub;
pub mod repository;
pub mod sqlite_store;
pub mod store;

pub use hub::{SessionHub, TranscriptEvent};
pub use repository::{SessionRepository, Transcript, MAX_APPEND_ATTEMPTS};
pub use sqlite_store::SqliteStore;
pub use store::{Expect, InMemoryStore, KeyValueStore, Versioned};
