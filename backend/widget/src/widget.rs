//! End-user chat controller.
//!
//! Owns one session's conversation: profile capture, message send, admin
//! escalation with its response countdown, and reconciliation with writes
//! made by the admin panel. The transcript in the store is authoritative;
//! the in-memory copy is refreshed on every write and on every sync tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use concierge_core::contact::{admin_requested_notice, welcome_message};
use concierge_core::{
    ChatRequest, ConciergeError, ContactLinks, EscalationPolicy, Message, Responder, Result,
    SessionId, SessionStatus, UserProfile,
};
use concierge_logging::{ChatEvent, ChatEventLogger};
use concierge_store::{SessionRepository, Transcript, TranscriptEvent};

use crate::state::{compose, Phase, Stage, WidgetState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Apa syarat PPIU?",
    "Berapa lama proses PIHK?",
    "Konsultasi pajak",
    "Cek kelayakan perusahaan",
];

/// Suggested prompts are offered until the transcript grows past this.
pub const SUGGESTED_PROMPTS_MAX_MESSAGES: usize = 2;

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub poll_interval: Duration,
    pub policy: EscalationPolicy,
    pub links: ContactLinks,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: EscalationPolicy::default(),
            links: ContactLinks::default(),
        }
    }
}

/// Wall clock driven by tokio's monotonic clock, so paused-time tests and
/// the countdown agree on "now".
#[derive(Debug, Clone, Copy)]
struct WidgetClock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl WidgetClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.wall + chrono::Duration::from_std(self.mono.elapsed()).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

struct Inner {
    stage: Stage,
    phase: Phase,
    messages: Vec<Message>,
    version: u64,
    profile: Option<UserProfile>,
    profile_skipped: bool,
    loaded: bool,
    countdown_gen: u64,
}

#[derive(Default)]
struct Tasks {
    countdown: Option<JoinHandle<()>>,
    sync: Option<JoinHandle<()>>,
}

struct Shared {
    session_id: SessionId,
    repo: SessionRepository,
    responder: Arc<dyn Responder>,
    config: WidgetConfig,
    clock: WidgetClock,
    inner: Mutex<Inner>,
    tasks: std::sync::Mutex<Tasks>,
    typing: AtomicBool,
}

/// The chat widget for one session.
///
/// Dropping the widget stops its background sync loop and any pending
/// fallback countdown.
pub struct ChatWidget {
    shared: Arc<Shared>,
}

impl ChatWidget {
    pub fn new(
        session_id: SessionId,
        repo: SessionRepository,
        responder: Arc<dyn Responder>,
        config: WidgetConfig,
    ) -> Self {
        let inner = Inner {
            stage: Stage::Closed,
            phase: Phase::Unescalated,
            messages: Vec::new(),
            version: 0,
            profile: None,
            profile_skipped: false,
            loaded: false,
            countdown_gen: 0,
        };
        Self {
            shared: Arc::new(Shared {
                session_id,
                repo,
                responder,
                config,
                clock: WidgetClock::start(),
                inner: Mutex::new(inner),
                tasks: std::sync::Mutex::new(Tasks::default()),
                typing: AtomicBool::new(false),
            }),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Show the widget. Loads the session on first open and starts the sync
    /// loop.
    pub async fn open(&self) -> Result<WidgetState> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        if inner.stage != Stage::Closed {
            return Ok(compose(inner.stage, inner.phase));
        }

        if !inner.loaded {
            inner.profile = shared.repo.load_profile(&shared.session_id).await?;
            let transcript = shared.repo.load_transcript(&shared.session_id).await?;
            inner.messages = transcript.messages;
            inner.version = transcript.version;
            inner.loaded = true;
            shared.restore_escalation(&mut inner);
        }

        if inner.profile.is_some() || inner.profile_skipped {
            inner.stage = Stage::Chatting;
            shared.ensure_welcome(&mut inner).await?;
        } else {
            inner.stage = Stage::CollectingProfile;
        }
        let state = compose(inner.stage, inner.phase);
        drop(inner);

        shared.start_sync();
        info!(session_id = %shared.session_id, state = %state, "Widget opened");
        Ok(state)
    }

    /// Hide the widget. Transcript and profile persist; a pending fallback
    /// countdown keeps running.
    pub async fn close(&self) -> WidgetState {
        let mut inner = self.shared.inner.lock().await;
        inner.stage = Stage::Closed;
        if let Some(sync) = self.shared.tasks().sync.take() {
            sync.abort();
        }
        debug!(session_id = %self.shared.session_id, "Widget closed");
        WidgetState::Closed
    }

    /// Submit the profile form. Blank name or company is rejected without
    /// touching the store.
    pub async fn submit_profile(
        &self,
        name: &str,
        company: &str,
        phone: Option<&str>,
    ) -> Result<WidgetState> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        if inner.stage != Stage::CollectingProfile {
            return Err(ConciergeError::InvalidState(
                "profile form is not being shown".into(),
            ));
        }
        let profile = UserProfile::from_form(name, company, phone)?;
        shared.repo.save_profile(&shared.session_id, &profile).await?;
        ChatEventLogger::log_event(
            shared.session_id.as_str(),
            ChatEvent::ProfileCaptured {
                name: profile.name.clone(),
                company: profile.company.clone(),
            },
        );

        inner.profile = Some(profile);
        inner.stage = Stage::Chatting;
        shared.ensure_welcome(&mut inner).await?;
        Ok(compose(inner.stage, inner.phase))
    }

    /// Continue without a profile. No profile is stored.
    pub async fn skip_profile(&self) -> Result<WidgetState> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        if inner.stage != Stage::CollectingProfile {
            return Err(ConciergeError::InvalidState(
                "profile form is not being shown".into(),
            ));
        }
        inner.profile_skipped = true;
        inner.stage = Stage::Chatting;
        shared.ensure_welcome(&mut inner).await?;
        Ok(compose(inner.stage, inner.phase))
    }

    /// Send a user message and append the responder's answer.
    ///
    /// A responder failure never surfaces here: the answer is replaced by a
    /// contact notice and the user's own message stays in the transcript.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ConciergeError::validation("message must not be empty"));
        }
        let shared = &self.shared;

        let request = {
            let mut inner = shared.inner.lock().await;
            shared.require_chatting(&inner)?;
            if inner.phase == Phase::AdminRequested {
                shared.cancel_countdown(&mut inner);
                inner.phase = Phase::Unescalated;
            }
            let user = Message::user(text).with_timestamp(shared.clock.now());
            shared.append_locked(&mut inner, user).await?;

            let mut request = ChatRequest::new(shared.session_id.as_str(), inner.messages.clone());
            if inner.phase == Phase::AdminActive {
                request.admin_takeover = Some(true);
            }
            request
        };

        shared.typing.store(true, Ordering::SeqCst);
        let outcome = shared.responder.respond(&request).await;
        shared.typing.store(false, Ordering::SeqCst);

        let reply = match outcome {
            Ok(reply) if reply.is_suppressed() && request.is_admin_takeover() => {
                debug!(session_id = %shared.session_id, "Responder stood down for admin");
                None
            }
            Ok(reply) if reply.is_suppressed() => {
                warn!(session_id = %shared.session_id, responder = %shared.responder.name(), "Responder returned an empty answer");
                Some(shared.config.links.responder_failure_notice())
            }
            Ok(reply) => Some(reply.into_message()),
            Err(e) => {
                warn!(session_id = %shared.session_id, responder = %shared.responder.name(), error = %e, "Responder failed");
                ChatEventLogger::log_event(
                    shared.session_id.as_str(),
                    ChatEvent::ResponderFailed { error_msg: e.to_string() },
                );
                Some(shared.config.links.responder_failure_notice())
            }
        };

        if let Some(message) = reply {
            let mut inner = shared.inner.lock().await;
            let message = message.with_timestamp(shared.clock.now());
            shared.append_locked(&mut inner, message).await?;
        }
        Ok(())
    }

    /// Ask for a human operator and arm the response countdown.
    ///
    /// Repeated requests are allowed; each one restarts the countdown.
    pub async fn request_admin(&self) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        shared.require_chatting(&inner)?;
        if inner.phase == Phase::AdminActive {
            return Err(ConciergeError::InvalidState(
                "an admin is already handling this chat".into(),
            ));
        }

        let notice = admin_requested_notice(shared.clock.now());
        shared.append_locked(&mut inner, notice).await?;
        ChatEventLogger::log_event(shared.session_id.as_str(), ChatEvent::AdminRequested);
        if inner.phase == Phase::AdminActive {
            // A takeover landed between our last read and this write.
            return Ok(());
        }

        inner.phase = Phase::AdminRequested;
        let window = shared.config.policy.response_window.to_std().unwrap_or_default();
        shared.arm_countdown(&mut inner, window);
        info!(session_id = %shared.session_id, "Admin requested");
        Ok(())
    }

    /// Re-read the stored transcript once. Returns whether the in-memory
    /// copy changed.
    pub async fn poll_once(&self) -> Result<bool> {
        self.shared.poll().await
    }

    /// Reset the transcript to a fresh welcome message.
    pub async fn clear_chat(&self) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock().await;
        shared.require_chatting(&inner)?;
        shared.cancel_countdown(&mut inner);
        inner.phase = Phase::Unescalated;

        let welcome = welcome_message(inner.profile.as_ref()).with_timestamp(shared.clock.now());
        let transcript = shared.repo.replace(&shared.session_id, vec![welcome]).await?;
        inner.messages = transcript.messages;
        inner.version = transcript.version;
        info!(session_id = %shared.session_id, "Chat cleared");
        Ok(())
    }

    pub async fn state(&self) -> WidgetState {
        let inner = self.shared.inner.lock().await;
        compose(inner.stage, inner.phase)
    }

    /// Derived status of the in-memory transcript.
    pub async fn status(&self) -> SessionStatus {
        let inner = self.shared.inner.lock().await;
        self.shared
            .config
            .policy
            .derive_status(&inner.messages, self.shared.clock.now())
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.shared.inner.lock().await.messages.clone()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.shared.inner.lock().await.profile.clone()
    }

    pub async fn suggested_prompts(&self) -> Vec<&'static str> {
        let inner = self.shared.inner.lock().await;
        if inner.stage == Stage::Chatting && inner.messages.len() <= SUGGESTED_PROMPTS_MAX_MESSAGES {
            SUGGESTED_PROMPTS.to_vec()
        } else {
            Vec::new()
        }
    }

    /// True while a responder call is in flight.
    pub fn is_typing(&self) -> bool {
        self.shared.typing.load(Ordering::SeqCst)
    }

    /// True while a fallback countdown is pending.
    pub fn fallback_pending(&self) -> bool {
        self.shared.tasks().countdown.is_some()
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        let mut tasks = self.shared.tasks();
        if let Some(t) = tasks.countdown.take() {
            t.abort();
        }
        if let Some(t) = tasks.sync.take() {
            t.abort();
        }
    }
}

impl Shared {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_chatting(&self, inner: &Inner) -> Result<()> {
        if inner.stage == Stage::Chatting {
            Ok(())
        } else {
            Err(ConciergeError::InvalidState(format!(
                "widget is {}",
                compose(inner.stage, inner.phase)
            )))
        }
    }

    async fn ensure_welcome(&self, inner: &mut Inner) -> Result<()> {
        if inner.messages.is_empty() {
            let welcome = welcome_message(inner.profile.as_ref()).with_timestamp(self.clock.now());
            self.append_locked(inner, welcome).await?;
        }
        Ok(())
    }

    async fn append_locked(&self, inner: &mut Inner, message: Message) -> Result<()> {
        let role = message.role.to_string();
        let content = message.content.clone();
        let transcript = self.repo.append(&self.session_id, message).await?;
        ChatEventLogger::log_event(
            self.session_id.as_str(),
            ChatEvent::MessageAppended { role, content },
        );
        inner.messages = transcript.messages;
        inner.version = transcript.version;
        self.observe_takeover(inner);
        Ok(())
    }

    fn apply_transcript(&self, inner: &mut Inner, transcript: Transcript) -> bool {
        if transcript.version < inner.version {
            return false;
        }
        let changed = transcript.messages.len() != inner.messages.len()
            || transcript.messages.last().map(|m| &m.id) != inner.messages.last().map(|m| &m.id);
        if changed {
            inner.messages = transcript.messages;
        }
        inner.version = transcript.version;
        self.observe_takeover(inner);
        changed
    }

    fn observe_takeover(&self, inner: &mut Inner) {
        if inner.phase != Phase::AdminActive && inner.messages.iter().any(Message::is_admin_active) {
            inner.phase = Phase::AdminActive;
            self.cancel_countdown(inner);
            info!(session_id = %self.session_id, "Admin takeover observed");
        }
    }

    /// Rebuild the escalation phase from a freshly loaded transcript.
    fn restore_escalation(self: &Arc<Self>, inner: &mut Inner) {
        let policy = &self.config.policy;
        let now = self.clock.now();
        if inner.messages.iter().any(Message::is_admin_active) {
            inner.phase = Phase::AdminActive;
            return;
        }
        match policy.response_deadline(&inner.messages) {
            Some(deadline) => {
                let request_idx = inner
                    .messages
                    .iter()
                    .rposition(|m| m.admin_request_time().is_some())
                    .unwrap_or(0);
                let fired = inner.messages[request_idx..]
                    .iter()
                    .any(Message::is_whatsapp_fallback);
                if fired {
                    inner.phase = Phase::WhatsappFallback;
                } else {
                    inner.phase = Phase::AdminRequested;
                    let remaining = (deadline - now).to_std().unwrap_or_default();
                    self.arm_countdown(inner, remaining);
                }
            }
            None if inner.messages.iter().any(Message::is_whatsapp_fallback) => {
                inner.phase = Phase::WhatsappFallback;
            }
            None => inner.phase = Phase::Unescalated,
        }
    }

    fn cancel_countdown(&self, inner: &mut Inner) {
        inner.countdown_gen += 1;
        if let Some(t) = self.tasks().countdown.take() {
            t.abort();
        }
    }

    fn arm_countdown(self: &Arc<Self>, inner: &mut Inner, after: Duration) {
        self.cancel_countdown(inner);
        let generation = inner.countdown_gen;
        let weak: Weak<Shared> = Arc::downgrade(self);
        let session_id = self.session_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(shared) = weak.upgrade() {
                if let Err(e) = shared.fire_fallback(generation).await {
                    warn!(session_id = %session_id, error = %e, "WhatsApp fallback could not be written");
                }
            }
        });
        self.tasks().countdown = Some(handle);
        debug!(session_id = %self.session_id, after_secs = after.as_secs(), "Fallback countdown armed");
    }

    async fn fire_fallback(&self, generation: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.countdown_gen != generation || inner.phase != Phase::AdminRequested {
            return Ok(());
        }
        // Detach: this task must not abort itself below.
        drop(self.tasks().countdown.take());

        let transcript = self.repo.load_transcript(&self.session_id).await?;
        self.apply_transcript(&mut inner, transcript);
        if inner.phase == Phase::AdminActive {
            return Ok(());
        }

        let notice = self.config.links.whatsapp_fallback_notice(self.clock.now());
        self.append_locked(&mut inner, notice).await?;
        if inner.phase != Phase::AdminActive {
            inner.phase = Phase::WhatsappFallback;
        }
        ChatEventLogger::log_event(self.session_id.as_str(), ChatEvent::FallbackFired);
        info!(session_id = %self.session_id, "Admin did not respond in time, WhatsApp fallback shown");
        Ok(())
    }

    async fn poll(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let transcript = self.repo.load_transcript(&self.session_id).await?;
        Ok(self.apply_transcript(&mut inner, transcript))
    }

    fn start_sync(self: &Arc<Self>) {
        let mut tasks = self.tasks();
        if tasks.sync.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        let period = self.config.poll_interval;
        let hub = self.repo.hub().cloned();
        let session_id = self.session_id.clone();

        tasks.sync = Some(tokio::spawn(async move {
            let mut hint = match &hub {
                Some(hub) => Some(hub.subscribe(&session_id).await),
                None => None,
            };
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                let mut hub_gone = false;
                tokio::select! {
                    _ = ticker.tick() => {}
                    alive = next_hint(&mut hint) => hub_gone = !alive,
                }
                if hub_gone {
                    hint = None;
                }
                let Some(shared) = weak.upgrade() else { break };
                if let Err(e) = shared.poll().await {
                    warn!(session_id = %session_id, error = %e, "Transcript poll failed");
                }
            }
        }));
    }
}

/// Resolves on the next push notification. Never resolves without a hub.
async fn next_hint(rx: &mut Option<broadcast::Receiver<TranscriptEvent>>) -> bool {
    match rx {
        Some(rx) => !matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)),
        None => std::future::pending().await,
    }
}
