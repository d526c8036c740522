//! Widget-facing sync endpoints: the poll read and the SSE push channel.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use concierge_core::{Message, SessionId, SessionStatus};
use concierge_store::TranscriptEvent;

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    pub version: u64,
    pub status: SessionStatus,
}

/// `GET /api/sessions/:id/messages`
pub async fn messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessagesResponse>> {
    let id = SessionId::from(id);
    let transcript = state.repo.load_transcript(&id).await?;
    let status = state.policy().derive_status(&transcript.messages, Utc::now());
    debug!(session_id = %id, version = transcript.version, "Transcript polled");
    Ok(Json(MessagesResponse {
        messages: transcript.messages,
        version: transcript.version,
        status,
    }))
}

fn to_sse(item: Result<TranscriptEvent, BroadcastStreamRecvError>) -> Option<Result<Event, Infallible>> {
    let event = match item {
        Ok(ev) => Event::default()
            .event("transcript")
            .json_data(&ev)
            .unwrap_or_else(|_| Event::default().event("resync").data("{}")),
        // The client missed updates and should re-read the transcript.
        Err(BroadcastStreamRecvError::Lagged(n)) => Event::default().event("resync").data(n.to_string()),
    };
    Some(Ok(event))
}

/// `GET /api/sessions/:id/events`
///
/// Each event is a hint; clients still reconcile through the poll endpoint.
pub async fn events(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let hub = state
        .repo
        .hub()
        .ok_or_else(|| ApiError::Unavailable("push channel disabled".into()))?;
    let id = SessionId::from(id);
    let rx = hub.subscribe(&id).await;
    info!(session_id = %id, "SSE subscriber attached");

    let stream = BroadcastStream::new(rx).filter_map(to_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new()))
}
