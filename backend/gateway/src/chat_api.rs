//! Responder endpoint (`/api/chat`).

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use concierge_core::ChatRequest;
use concierge_responder::server_failure_reply;

use crate::error::{ApiError, ApiResult};
use crate::rate_limit::client_key;
use crate::server::GatewayState;

pub const NO_MESSAGE_TEXT: &str = "No message provided";

/// `POST /api/chat`
pub async fn chat(
    State(state): State<GatewayState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let client = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    if !state.rate_limiter.check_limit(&client).await {
        return Err(ApiError::RateLimited);
    }

    let Json(request) = body.map_err(|e| {
        debug!(error = %e, "Unreadable chat request");
        ApiError::bad_request(NO_MESSAGE_TEXT)
    })?;
    if request.last_user_text().is_none() {
        return Err(ApiError::bad_request(NO_MESSAGE_TEXT));
    }

    match state.responder.respond(&request).await {
        Ok(reply) => Ok(Json(reply).into_response()),
        Err(e) => {
            error!(session_id = %request.session_id, responder = state.responder.name(), error = %e, "Responder failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(server_failure_reply(&state.links)),
            )
                .into_response())
        }
    }
}

/// `GET /api/chat`
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "faq_loaded": state.responder_health.faq_loaded,
        "intents_count": state.responder_health.intents_count,
    }))
}
