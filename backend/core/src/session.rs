//! Session identifiers and the store key convention.
//!
//! One key per session holds the JSON message array, a second holds the
//! JSON user profile. Both are namespaced by session id so every transcript
//! can be found with a prefix scan.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix of the key holding a session's transcript.
pub const TRANSCRIPT_KEY_PREFIX: &str = "chatMessages_";

/// Prefix of the key holding a session's user profile.
pub const PROFILE_KEY_PREFIX: &str = "userProfile_";

const SUFFIX_LEN: usize = 9;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Opaque, client-generated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh id: millisecond timestamp plus a random suffix.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used as a display fallback.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    pub fn transcript_key(&self) -> String {
        format!("{TRANSCRIPT_KEY_PREFIX}{}", self.0)
    }

    pub fn profile_key(&self) -> String {
        format!("{PROFILE_KEY_PREFIX}{}", self.0)
    }

    /// Recover the session id from a transcript key.
    pub fn from_transcript_key(key: &str) -> Option<Self> {
        key.strip_prefix(TRANSCRIPT_KEY_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
