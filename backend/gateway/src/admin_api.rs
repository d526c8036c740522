//! Admin panel endpoints. Every handler requires an admin token.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use concierge_admin::{render_html, SessionSummary};
use concierge_core::SessionId;
use concierge_store::Transcript;

use crate::auth::RequireAdmin;
use crate::error::ApiResult;
use crate::server::GatewayState;

fn transcript_body(t: Transcript) -> Json<Value> {
    Json(json!({
        "sessionId": t.session_id,
        "version": t.version,
        "messages": t.messages,
    }))
}

/// `GET /api/admin/sessions`
pub async fn list_sessions(
    State(state): State<GatewayState>,
    RequireAdmin(_): RequireAdmin,
) -> Json<Value> {
    let sessions = state.panel.list_sessions(Utc::now()).await;
    Json(json!({ "sessions": sessions }))
}

/// `GET /api/admin/sessions/:id`
pub async fn show_session(
    State(state): State<GatewayState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionSummary>> {
    let summary = state.panel.session(&SessionId::from(id), Utc::now()).await?;
    Ok(Json(summary))
}

/// `POST /api/admin/sessions/:id/takeover`
pub async fn take_over(
    State(state): State<GatewayState>,
    RequireAdmin(operator): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let transcript = state.panel.take_over(&operator, &SessionId::from(id)).await?;
    Ok(transcript_body(transcript))
}

#[derive(Debug, Deserialize)]
pub struct AdminMessageRequest {
    #[serde(default)]
    pub text: String,
}

/// `POST /api/admin/sessions/:id/messages`
pub async fn send_message(
    State(state): State<GatewayState>,
    RequireAdmin(operator): RequireAdmin,
    Path(id): Path<String>,
    Json(req): Json<AdminMessageRequest>,
) -> ApiResult<Json<Value>> {
    let id = SessionId::from(id);
    let transcript = state
        .panel
        .send_admin_message(&operator, Some(&id), &req.text)
        .await?;
    Ok(transcript_body(transcript))
}

/// `GET /api/admin/sessions/:id/export`
pub async fn export_session(
    State(state): State<GatewayState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let summary = state.panel.session(&SessionId::from(id), Utc::now()).await?;
    let disposition = format!(
        "attachment; filename=\"chat-{}.html\"",
        summary.id.as_str().replace(['"', '\\', '/'], "_")
    );
    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Html(render_html(&summary)),
    ))
}
