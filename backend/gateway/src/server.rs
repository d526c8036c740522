//! Main HTTP gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use concierge_admin::AdminPanel;
use concierge_core::{ContactLinks, EscalationPolicy, Responder};
use concierge_responder::FaqResponder;
use concierge_store::SessionRepository;

use crate::admin_api;
use crate::auth::{self, AdminAuth};
use crate::chat_api;
use crate::rate_limit::RateLimiter;
use crate::sessions_api;

/// What `GET /api/chat` reports about the configured responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponderHealth {
    pub faq_loaded: bool,
    pub intents_count: usize,
}

impl ResponderHealth {
    pub fn from_faq(faq: &FaqResponder) -> Self {
        Self {
            faq_loaded: faq.is_loaded(),
            intents_count: faq.intents_count(),
        }
    }
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub repo: SessionRepository,
    pub panel: AdminPanel,
    pub responder: Arc<dyn Responder>,
    pub responder_health: ResponderHealth,
    pub links: ContactLinks,
    pub rate_limiter: RateLimiter,
    pub auth: Arc<AdminAuth>,
}

impl GatewayState {
    pub fn new(
        repo: SessionRepository,
        responder: Arc<dyn Responder>,
        responder_health: ResponderHealth,
        policy: EscalationPolicy,
        links: ContactLinks,
        auth: AdminAuth,
    ) -> Self {
        Self {
            panel: AdminPanel::new(repo.clone(), policy),
            repo,
            responder,
            responder_health,
            links,
            rate_limiter: RateLimiter::default(),
            auth: Arc::new(auth),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn policy(&self) -> &EscalationPolicy {
        self.panel.policy()
    }
}

/// Build the router with every API route.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_api::chat).get(chat_api::health))
        .route("/api/sessions/:id/messages", get(sessions_api::messages))
        .route("/api/sessions/:id/events", get(sessions_api::events))
        .route(
            "/api/admin/auth",
            post(auth::login).delete(auth::logout),
        )
        .route("/api/admin/auth/verify", get(auth::verify))
        .route("/api/admin/sessions", get(admin_api::list_sessions))
        .route("/api/admin/sessions/:id", get(admin_api::show_session))
        .route("/api/admin/sessions/:id/takeover", post(admin_api::take_over))
        .route("/api/admin/sessions/:id/messages", post(admin_api::send_message))
        .route("/api/admin/sessions/:id/export", get(admin_api::export_session))
        .with_state(state)
}

/// Serve the gateway until `shutdown` resolves.
#[instrument(skip(state, shutdown))]
pub async fn start_server(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let limiter = state.rate_limiter.clone();
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Forget idle rate-limit windows so the table does not grow unbounded.
    let pruner = tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window);
        loop {
            interval.tick().await;
            limiter.prune().await;
        }
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Gateway HTTP server listening on {}", addr);
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;
    pruner.abort();
    served.context("Gateway server failed")?;

    info!("Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use concierge_core::contact::admin_requested_notice;
    use concierge_core::{ChatReply, ChatRequest, Message, SessionId};
    use concierge_responder::FaqTable;
    use concierge_store::{InMemoryStore, SessionHub};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::hash_password;

    struct FailingResponder;

    #[async_trait]
    impl Responder for FailingResponder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn respond(&self, _request: &ChatRequest) -> anyhow::Result<ChatReply> {
            anyhow::bail!("upstream timed out")
        }
    }

    fn state_with(responder: Arc<dyn Responder>) -> GatewayState {
        let repo = SessionRepository::new(Arc::new(InMemoryStore::new())).with_hub(SessionHub::new());
        let links = ContactLinks::new("62811");
        let faq = FaqResponder::new(FaqTable::builtin().unwrap(), links.clone());
        let auth = AdminAuth::new(
            "admin",
            Some(hash_password("pepper", "rahasia")),
            "pepper",
            "signing-key",
            chrono::Duration::hours(24),
        );
        GatewayState::new(
            repo,
            responder,
            ResponderHealth::from_faq(&faq),
            EscalationPolicy::default(),
            links,
            auth,
        )
    }

    fn state() -> GatewayState {
        let faq = FaqResponder::new(FaqTable::builtin().unwrap(), ContactLinks::new("62811"));
        state_with(Arc::new(faq))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn chat_body(text: &str) -> Value {
        json!({
            "session_id": "s1",
            "messages": [serde_json::to_value(Message::user(text)).unwrap()],
        })
    }

    async fn login(app: &Router) -> String {
        let resp = app
            .clone()
            .oneshot(post_json("/api/admin/auth", json!({"username": "admin", "password": "rahasia"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        cookie.split(';').next().unwrap().to_string()
    }

    fn authed(method: &str, uri: &str, cookie: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json");
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        builder.body(body).unwrap()
    }

    #[tokio::test]
    async fn chat_answers_from_faq() {
        let app = build_router(state());
        let (status, body) = send(&app, post_json("/api/chat", chat_body("Apa syarat PPIU?"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intent"], "ppiu");
        assert_eq!(body["benefits"].as_array().unwrap().len(), 3);
        assert!(body["cta"]["primary"]["link"].as_str().unwrap().starts_with("https://wa.me/62811?text="));
    }

    #[tokio::test]
    async fn chat_without_user_message_is_rejected() {
        let app = build_router(state());
        let body = json!({
            "session_id": "s1",
            "messages": [serde_json::to_value(Message::assistant("Halo")).unwrap()],
        });
        let (status, body) = send(&app, post_json("/api/chat", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No message provided");

        let (status, _) = send(&app, post_json("/api/chat", json!({"nope": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_failure_returns_complete_fallback_reply() {
        let app = build_router(state_with(Arc::new(FailingResponder)));
        let (status, body) = send(&app, post_json("/api/chat", chat_body("Halo"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["intent"], "error");
        assert_eq!(body["confidence"], 0.0);
        assert_eq!(body["benefits"], json!(["Respon cepat", "Layanan 24/7", "Konsultasi gratis"]));
        assert_eq!(body["cta"]["primary"]["link"], "https://wa.me/62811");
    }

    #[tokio::test]
    async fn chat_is_rate_limited_per_client() {
        let app = build_router(state().with_rate_limiter(RateLimiter::new(1, Duration::from_secs(60))));
        let mut req = post_json("/api/chat", chat_body("Halo"));
        req.headers_mut().insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        assert_eq!(send(&app, req).await.0, StatusCode::OK);

        let mut req = post_json("/api/chat", chat_body("Halo"));
        req.headers_mut().insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Too many requests. Please try again later.");
    }

    #[tokio::test]
    async fn chat_health_reports_faq_table() {
        let app = build_router(state());
        let (status, body) = send(&app, Request::get("/api/chat").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["faq_loaded"], true);
        assert_eq!(body["intents_count"], 8);
    }

    #[tokio::test]
    async fn poll_endpoint_returns_transcript_and_status() {
        let state = state();
        let id = SessionId::from("s1");
        state.repo.append(&id, Message::user("Halo")).await.unwrap();
        state.repo.append(&id, admin_requested_notice(chrono::Utc::now())).await.unwrap();
        let app = build_router(state);

        let (status, body) = send(&app, Request::get("/api/sessions/s1/messages").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 2);
        assert_eq!(body["status"], "admin-requested");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, Request::get("/api/sessions/new/messages").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 0);
        assert_eq!(body["status"], "ai-only");
    }

    #[tokio::test]
    async fn events_endpoint_streams_sse() {
        let app = build_router(state());
        let resp = app
            .oneshot(Request::get("/api/sessions/s1/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    }

    #[tokio::test]
    async fn login_flow() {
        let app = build_router(state());

        let (status, _) = send(&app, post_json("/api/admin/auth", json!({"username": "admin"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, post_json("/api/admin/auth", json!({"username": "admin", "password": "x"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");

        let resp = app
            .clone()
            .oneshot(post_json("/api/admin/auth", json!({"username": "admin", "password": "rahasia"})))
            .await
            .unwrap();
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("admin-token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("Path=/"));

        let pair = cookie.split(';').next().unwrap();
        let (status, body) = send(&app, authed("GET", "/api/admin/auth/verify", pair, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");

        let (status, _) = send(&app, Request::get("/api/admin/auth/verify").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, authed("GET", "/api/admin/auth/verify", "admin-token=bogus", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(Request::delete("/api/admin/auth").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.headers()[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn non_admin_token_is_forbidden() {
        let state = state();
        let mut viewer = concierge_admin::Operator::admin("viewer");
        viewer.role = "viewer".into();
        let token = state.auth.issue_token(&viewer, chrono::Utc::now()).unwrap();
        let app = build_router(state);
        let cookie = format!("admin-token={token}");

        let (status, _) = send(&app, authed("GET", "/api/admin/auth/verify", &cookie, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, authed("GET", "/api/admin/sessions", &cookie, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_endpoints_drive_takeover() {
        let state = state();
        let repo = state.repo.clone();
        let id = SessionId::from("1717000000000-abc");
        repo.append(&id, Message::user("Halo")).await.unwrap();
        let app = build_router(state);

        let (status, _) = send(&app, Request::get("/api/admin/sessions").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let cookie = login(&app).await;
        let (status, body) = send(&app, authed("GET", "/api/admin/sessions", &cookie, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"][0]["id"], "1717000000000-abc");
        assert_eq!(body["sessions"][0]["status"], "ai-only");

        let uri = "/api/admin/sessions/1717000000000-abc";
        let (status, body) = send(&app, authed("POST", &format!("{uri}/takeover"), &cookie, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 2);

        let (status, _) =
            send(&app, authed("POST", &format!("{uri}/messages"), &cookie, Some(json!({"text": " "})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) =
            send(&app, authed("POST", &format!("{uri}/messages"), &cookie, Some(json!({"text": "Saya bantu"})))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"][2]["role"], "admin");

        let (status, body) = send(&app, authed("GET", uri, &cookie, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "admin-active");
        assert_eq!(body["messageCount"], 3);

        let (status, _) = send(&app, authed("POST", "/api/admin/sessions/ghost/takeover", &cookie, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(authed("GET", &format!("{uri}/export"), &cookie, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("chat-1717000000000-abc.html"));
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("Saya bantu"));
    }
}
