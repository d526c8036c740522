//! Wiring from a loaded config to the runtime pieces every command needs.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use concierge_admin::{AdminPanel, Operator};
use concierge_config::{
    config_dir, config_file_path, load_and_prepare, resolve_path, ConciergeConfig, ResponderKind,
};
use concierge_core::{ContactLinks, EscalationPolicy, Responder};
use concierge_gateway::{AdminAuth, RateLimiter, ResponderHealth};
use concierge_responder::{
    FaqResponder, FaqTable, HttpResponder, LlmResponder, LlmSettings, OpenRouterProvider,
};
use concierge_store::{SessionHub, SessionRepository, SqliteStore};
use concierge_widget::WidgetConfig;

pub struct AppContext {
    pub config_dir: PathBuf,
    pub config: ConciergeConfig,
    pub repo: SessionRepository,
}

impl AppContext {
    /// Load the config and open the session store it names.
    pub async fn load(dir_flag: Option<&Path>) -> Result<Self> {
        let config_dir = config_dir(dir_flag);
        let config = load_and_prepare(&config_file_path(&config_dir)).await?;

        let store_path = resolve_path(&config_dir, config.store_path());
        if let Some(parent) = store_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }
        let store = SqliteStore::open(&store_path)?;
        let repo = SessionRepository::new(Arc::new(store)).with_hub(SessionHub::new());

        Ok(Self {
            config_dir,
            config,
            repo,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        let dir = self
            .config
            .logging
            .as_ref()
            .and_then(|l| l.dir.as_deref())
            .unwrap_or("logs");
        resolve_path(&self.config_dir, dir)
    }

    pub fn bind_address(&self, port_override: Option<u16>) -> Result<SocketAddr> {
        let mut addr: SocketAddr = self
            .config
            .bind_address()
            .parse()
            .context("Invalid server bind address")?;
        if let Some(port) = port_override {
            addr.set_port(port);
        }
        Ok(addr)
    }

    pub fn local_port(&self) -> u16 {
        self.config
            .server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(8080)
    }

    pub fn policy(&self) -> EscalationPolicy {
        EscalationPolicy::new(
            self.config.admin_response_timeout_mins() as i64,
            self.config.urgent_threshold_mins() as i64,
        )
    }

    pub fn links(&self) -> ContactLinks {
        ContactLinks::new(self.config.whatsapp_number())
    }

    pub fn widget_config(&self) -> WidgetConfig {
        WidgetConfig {
            poll_interval: self.config.poll_interval(),
            policy: self.policy(),
            links: self.links(),
        }
    }

    pub fn panel(&self) -> AdminPanel {
        AdminPanel::new(self.repo.clone(), self.policy())
    }

    /// Operator used by the admin subcommands.
    pub fn operator(&self, name: Option<String>) -> Operator {
        Operator::admin(name.unwrap_or_else(|| self.config.admin_username().to_string()))
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.config.rate_limit_max_requests(),
            self.config.rate_limit_window(),
        )
    }

    pub fn admin_auth(&self) -> AdminAuth {
        let admin = self.config.admin.clone().unwrap_or_default();
        AdminAuth::new(
            self.config.admin_username(),
            admin.password_hash,
            admin.salt.unwrap_or_default(),
            admin.token_secret.unwrap_or_default(),
            chrono::Duration::hours(self.config.token_ttl_hours() as i64),
        )
    }

    /// The FAQ table. A missing or broken table file yields an unloaded
    /// responder so the server still starts and reports it on `/api/chat`.
    pub fn faq_responder(&self) -> FaqResponder {
        let configured = self
            .config
            .responder
            .as_ref()
            .and_then(|r| r.faq_path.as_deref());

        let table = match configured {
            Some(path) => FaqTable::load(&resolve_path(&self.config_dir, path)),
            None => FaqTable::builtin(),
        };
        match table {
            Ok(table) => {
                info!(intents = table.intents_count(), "FAQ table loaded");
                FaqResponder::new(table, self.links())
            }
            Err(e) => {
                warn!(error = %e, "FAQ table failed to load");
                FaqResponder::unloaded(self.links())
            }
        }
    }

    pub fn responder(&self) -> Result<(Arc<dyn Responder>, ResponderHealth)> {
        let faq = self.faq_responder();
        let health = ResponderHealth::from_faq(&faq);

        let responder: Arc<dyn Responder> = match self.config.responder_kind() {
            ResponderKind::Faq => Arc::new(faq),
            ResponderKind::Llm => {
                let llm = self
                    .config
                    .responder
                    .as_ref()
                    .and_then(|r| r.llm.clone())
                    .unwrap_or_default();
                let api_key = llm
                    .api_key
                    .clone()
                    .context("responder.llm.apiKey is required for the llm responder")?;

                let mut provider = OpenRouterProvider::new(api_key);
                if let Some(url) = &llm.base_url {
                    provider = provider.with_base_url(url);
                }

                let defaults = LlmSettings::default();
                let settings = LlmSettings {
                    model: llm.model.unwrap_or(defaults.model),
                    max_tokens: llm.max_tokens.unwrap_or(defaults.max_tokens),
                    temperature: llm.temperature.unwrap_or(defaults.temperature),
                    system_prompt: defaults.system_prompt,
                };
                info!(model = %settings.model, "Using LLM responder");
                Arc::new(LlmResponder::new(Arc::new(provider), faq, settings))
            }
        };
        Ok((responder, health))
    }

    /// Responder for a terminal chat. With `server` set, replies come from a
    /// running Concierge at that base URL instead of the local config.
    pub fn chat_responder(&self, server: Option<&str>) -> Result<Arc<dyn Responder>> {
        match server {
            Some(base) => {
                let endpoint = chat_endpoint(base);
                info!(endpoint = %endpoint, "Using remote responder");
                Ok(Arc::new(HttpResponder::new(endpoint)?))
            }
            None => Ok(self.responder()?.0),
        }
    }
}

/// `POST /api/chat` under a server base URL.
fn chat_endpoint(base: &str) -> String {
    format!("{}/api/chat", base.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn context_with(yaml: &str) -> (tempfile::TempDir, AppContext) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(config_file_path(dir.path()), yaml).unwrap();
        let ctx = AppContext::load(Some(dir.path())).await.unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn defaults_open_store_under_config_dir() {
        let (dir, ctx) = context_with("").await;
        assert!(dir.path().join("concierge.db").exists());
        assert_eq!(ctx.log_dir(), dir.path().join("logs"));
        assert_eq!(ctx.bind_address(None).unwrap().port(), 8080);
        assert_eq!(ctx.bind_address(Some(9000)).unwrap().port(), 9000);
        assert_eq!(ctx.operator(None).username, "admin");
    }

    #[tokio::test]
    async fn missing_faq_file_reports_unloaded() {
        let (_dir, ctx) = context_with("responder:\n  faqPath: nope.json\n").await;
        let (_responder, health) = ctx.responder().unwrap();
        assert!(!health.faq_loaded);
        assert_eq!(health.intents_count, 0);
    }

    #[tokio::test]
    async fn builtin_faq_is_default() {
        let (_dir, ctx) = context_with("contact:\n  whatsappNumber: \"62811\"\n").await;
        let (responder, health) = ctx.responder().unwrap();
        assert!(health.faq_loaded);
        assert_eq!(health.intents_count, 8);
        assert_eq!(responder.name(), ctx.faq_responder().name());
        assert_eq!(ctx.links().whatsapp_number(), "62811");
    }

    #[tokio::test]
    async fn timing_comes_from_chat_section() {
        let yaml = "chat:\n  pollIntervalSecs: 2\n  adminResponseTimeoutMins: 30\n  urgentThresholdMins: 10\n";
        let (_dir, ctx) = context_with(yaml).await;
        let widget = ctx.widget_config();
        assert_eq!(widget.poll_interval, std::time::Duration::from_secs(2));
        assert_eq!(widget.policy, EscalationPolicy::new(30, 10));
    }

    #[test]
    fn chat_endpoint_joins_base_url() {
        assert_eq!(chat_endpoint("http://localhost:8080"), "http://localhost:8080/api/chat");
        assert_eq!(chat_endpoint("https://chat.example.com/ "), "https://chat.example.com/api/chat");
    }

    #[tokio::test]
    async fn chat_uses_remote_server_when_named() {
        let (_dir, ctx) = context_with("").await;
        let remote = ctx.chat_responder(Some("http://127.0.0.1:8080/")).unwrap();
        assert_eq!(remote.name(), "http");

        let local = ctx.chat_responder(None).unwrap();
        assert_eq!(local.name(), ctx.faq_responder().name());
    }
}
