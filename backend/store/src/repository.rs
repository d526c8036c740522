//! Typed access to transcripts and profiles on top of a [`KeyValueStore`].
//!
//! Appends are read-modify-write cycles guarded by the store version, so two
//! writers racing on the same session both land instead of one overwriting
//! the other.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use concierge_core::session::TRANSCRIPT_KEY_PREFIX;
use concierge_core::{ConciergeError, Message, Result, SessionId, UserProfile};

use crate::hub::{SessionHub, TranscriptEvent};
use crate::store::{Expect, KeyValueStore};

/// Attempts before a contended append gives up.
pub const MAX_APPEND_ATTEMPTS: usize = 8;

/// Ceiling for the randomized pause between append attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(64);

/// A transcript as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
    /// Store version; 0 when the session has never been written.
    pub version: u64,
}

impl Transcript {
    fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    hub: Option<SessionHub>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, hub: None }
    }

    /// Publish every successful write to `hub`.
    pub fn with_hub(mut self, hub: SessionHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn hub(&self) -> Option<&SessionHub> {
        self.hub.as_ref()
    }

    /// Read a transcript. A missing key reads as an empty transcript.
    pub async fn load_transcript(&self, id: &SessionId) -> Result<Transcript> {
        let key = id.transcript_key();
        let Some(entry) = self.store.get(&key).await? else {
            return Ok(Transcript::empty(id.clone()));
        };
        let messages: Vec<Message> = serde_json::from_str(&entry.value)
            .map_err(|source| ConciergeError::Corrupt { key, source })?;
        Ok(Transcript {
            session_id: id.clone(),
            messages,
            version: entry.version,
        })
    }

    /// Append one entry, creating the transcript if needed.
    pub async fn append(&self, id: &SessionId, message: Message) -> Result<Transcript> {
        self.append_inner(id, message, false).await
    }

    /// Append one entry to a transcript that must already hold messages.
    pub async fn append_existing(&self, id: &SessionId, message: Message) -> Result<Transcript> {
        self.append_inner(id, message, true).await
    }

    async fn append_inner(
        &self,
        id: &SessionId,
        message: Message,
        require_existing: bool,
    ) -> Result<Transcript> {
        let key = id.transcript_key();
        let mut last_err = None;

        for attempt in 0..MAX_APPEND_ATTEMPTS {
            let mut transcript = self.load_transcript(id).await?;
            if require_existing && transcript.is_empty() {
                return Err(ConciergeError::SessionNotFound(id.to_string()));
            }
            transcript.messages.push(message.clone());
            let value = serde_json::to_string(&transcript.messages).map_err(anyhow::Error::from)?;

            match self.store.put(&key, value, Expect::Version(transcript.version)).await {
                Ok(version) => {
                    transcript.version = version;
                    debug!(session = %id, version, attempt, "Appended transcript entry");
                    self.publish(id, version, Some(message)).await;
                    return Ok(transcript);
                }
                Err(err @ ConciergeError::VersionConflict { .. }) => {
                    debug!(session = %id, attempt, "Transcript changed underneath append, retrying");
                    last_err = Some(err);
                    backoff(attempt).await;
                }
                Err(err @ ConciergeError::StoreBusy(_)) => {
                    debug!(session = %id, attempt, "Store busy, retrying append");
                    last_err = Some(err);
                    backoff(attempt).await;
                }
                Err(err) => return Err(err),
            }
        }

        warn!(session = %id, "Giving up append after {} attempts", MAX_APPEND_ATTEMPTS);
        Err(last_err.unwrap_or_else(|| {
            ConciergeError::Storage(format!("append to {key} did not complete"))
        }))
    }

    /// Overwrite a transcript unconditionally.
    pub async fn replace(&self, id: &SessionId, messages: Vec<Message>) -> Result<Transcript> {
        let value = serde_json::to_string(&messages).map_err(anyhow::Error::from)?;
        let version = self.store.put(&id.transcript_key(), value, Expect::Any).await?;
        self.publish(id, version, None).await;
        Ok(Transcript {
            session_id: id.clone(),
            messages,
            version,
        })
    }

    pub async fn save_profile(&self, id: &SessionId, profile: &UserProfile) -> Result<()> {
        let value = serde_json::to_string(profile).map_err(anyhow::Error::from)?;
        self.store.put(&id.profile_key(), value, Expect::Any).await?;
        Ok(())
    }

    pub async fn load_profile(&self, id: &SessionId) -> Result<Option<UserProfile>> {
        let key = id.profile_key();
        match self.store.get(&key).await? {
            Some(entry) => serde_json::from_str(&entry.value)
                .map(Some)
                .map_err(|source| ConciergeError::Corrupt { key, source }),
            None => Ok(None),
        }
    }

    /// Every session that has a transcript key.
    pub async fn session_ids(&self) -> Result<Vec<SessionId>> {
        let keys = self.store.keys_with_prefix(TRANSCRIPT_KEY_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|k| SessionId::from_transcript_key(k))
            .collect())
    }

    async fn publish(&self, id: &SessionId, version: u64, message: Option<Message>) {
        if let Some(hub) = &self.hub {
            hub.publish(TranscriptEvent {
                session_id: id.clone(),
                version,
                message,
            })
            .await;
        }
    }
}

/// Yield on the first retry, then sleep a jittered, doubling interval so two
/// writers that keep colliding fall out of step.
async fn backoff(attempt: usize) {
    if attempt == 0 {
        tokio::task::yield_now().await;
        return;
    }
    let ceiling = Duration::from_millis(1 << attempt.min(6)).min(MAX_BACKOFF);
    let jitter = rand::thread_rng().gen_range(Duration::ZERO..=ceiling);
    tokio::time::sleep(jitter).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_store::SqliteStore;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn repo() -> (SessionRepository, InMemoryStore) {
        let store = InMemoryStore::new();
        (SessionRepository::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_missing_transcript_reads_empty() {
        let (repo, _) = repo();
        let t = repo.load_transcript(&SessionId::from("s1")).await.unwrap();
        assert!(t.is_empty());
        assert_eq!(t.version, 0);
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let (repo, store) = repo();
        let id = SessionId::from("s1");
        repo.append(&id, Message::user("Halo")).await.unwrap();
        let t = repo.append(&id, Message::assistant("Hai")).await.unwrap();
        assert_eq!(t.messages.len(), 2);
        assert_eq!(t.version, 2);

        // Stored shape is a plain JSON array under the transcript key.
        let raw = store.get("chatMessages_s1").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw.value).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let (repo, _) = repo();
        let id = SessionId::from("busy");
        let mut handles = Vec::new();
        for i in 0..6 {
            let repo = repo.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                repo.append(&id, Message::user(format!("msg {i}"))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let t = repo.load_transcript(&id).await.unwrap();
        assert_eq!(t.messages.len(), 6);
    }

    /// Store whose first write always loses a race with another writer.
    struct RacingStore {
        inner: InMemoryStore,
        raced: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for RacingStore {
        async fn get(&self, key: &str) -> Result<Option<crate::store::Versioned>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: String, expect: Expect) -> Result<u64> {
            if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
                let other = serde_json::to_string(&vec![Message::admin("Saya admin")]).unwrap();
                self.inner.put(key, other, Expect::Any).await?;
            }
            self.inner.put(key, value, expect).await
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.keys_with_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn test_lost_race_is_retried_without_dropping_the_other_write() {
        let repo = SessionRepository::new(Arc::new(RacingStore {
            inner: InMemoryStore::new(),
            raced: AtomicUsize::new(0),
        }));
        let id = SessionId::from("s1");
        let t = repo.append(&id, Message::user("Halo")).await.unwrap();
        let contents: Vec<_> = t.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Saya admin", "Halo"]);
    }

    /// Store that reports busy for its first `busy` writes.
    struct BusyStore {
        inner: InMemoryStore,
        busy: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for BusyStore {
        async fn get(&self, key: &str) -> Result<Option<crate::store::Versioned>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: String, expect: Expect) -> Result<u64> {
            let left = self.busy.load(Ordering::SeqCst);
            if left > 0 {
                self.busy.store(left - 1, Ordering::SeqCst);
                return Err(ConciergeError::StoreBusy("database is locked".into()));
            }
            self.inner.put(key, value, expect).await
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.keys_with_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn test_busy_store_is_retried() {
        let repo = SessionRepository::new(Arc::new(BusyStore {
            inner: InMemoryStore::new(),
            busy: AtomicUsize::new(2),
        }));
        let t = repo.append(&SessionId::from("s1"), Message::user("Halo")).await.unwrap();
        assert_eq!(t.messages.len(), 1);
        assert_eq!(t.version, 1);
    }

    #[tokio::test]
    async fn test_store_busy_past_every_attempt_surfaces() {
        let repo = SessionRepository::new(Arc::new(BusyStore {
            inner: InMemoryStore::new(),
            busy: AtomicUsize::new(usize::MAX),
        }));
        let err = repo.append(&SessionId::from("s1"), Message::user("Halo")).await.unwrap_err();
        assert!(matches!(err, ConciergeError::StoreBusy(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_sqlite_connections_appending_to_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let widget = SessionRepository::new(Arc::new(SqliteStore::open(&path).unwrap()));
        let panel = SessionRepository::new(Arc::new(SqliteStore::open(&path).unwrap()));
        let id = SessionId::from("shared");

        let writer = |repo: SessionRepository, label: &'static str| {
            let id = id.clone();
            tokio::spawn(async move {
                for i in 0..25 {
                    repo.append(&id, Message::user(format!("{label} {i}"))).await?;
                }
                Ok::<_, ConciergeError>(())
            })
        };
        let (a, b) = tokio::join!(writer(widget.clone(), "visitor"), writer(panel, "admin"));
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let t = widget.load_transcript(&id).await.unwrap();
        assert_eq!(t.messages.len(), 50);
        assert_eq!(t.version, 50);
        let admin = t.messages.iter().filter(|m| m.content.starts_with("admin")).count();
        assert_eq!(admin, 25);
    }

    #[tokio::test]
    async fn test_append_existing_requires_messages() {
        let (repo, _) = repo();
        let id = SessionId::from("ghost");
        let err = repo.append_existing(&id, Message::admin("Halo")).await.unwrap_err();
        assert!(matches!(err, ConciergeError::SessionNotFound(_)));

        repo.replace(&id, vec![]).await.unwrap();
        let err = repo.append_existing(&id, Message::admin("Halo")).await.unwrap_err();
        assert!(matches!(err, ConciergeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_transcript_is_reported() {
        let (repo, store) = repo();
        store.put("chatMessages_bad", "{not json".into(), Expect::Any).await.unwrap();
        let err = repo.load_transcript(&SessionId::from("bad")).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Corrupt { ref key, .. } if key == "chatMessages_bad"));
    }

    #[tokio::test]
    async fn test_profiles_and_listing() {
        let (repo, _) = repo();
        let a = SessionId::from("a");
        let profile = UserProfile::from_form("Budi", "PT X", Some("0812")).unwrap();
        repo.save_profile(&a, &profile).await.unwrap();
        assert_eq!(repo.load_profile(&a).await.unwrap(), Some(profile));
        assert_eq!(repo.load_profile(&SessionId::from("b")).await.unwrap(), None);

        // Profiles alone do not make a session visible.
        assert!(repo.session_ids().await.unwrap().is_empty());
        repo.append(&a, Message::user("Halo")).await.unwrap();
        repo.append(&SessionId::from("b"), Message::user("Hai")).await.unwrap();
        let ids = repo.session_ids().await.unwrap();
        assert_eq!(ids, vec![SessionId::from("a"), SessionId::from("b")]);
    }

    #[tokio::test]
    async fn test_writes_are_published() {
        let hub = SessionHub::new();
        let repo = SessionRepository::new(Arc::new(InMemoryStore::new())).with_hub(hub.clone());
        let id = SessionId::from("s1");
        let mut rx = hub.subscribe(&id).await;

        repo.append(&id, Message::user("Halo")).await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.version, 1);
        assert_eq!(ev.message.unwrap().content, "Halo");

        repo.replace(&id, vec![]).await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.version, 2);
        assert!(ev.message.is_none());
    }
}
