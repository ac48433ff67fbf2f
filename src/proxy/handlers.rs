//! HTTP request handlers.

use axum::{
    extract::{Query, State},
    response::{sse::Sse, IntoResponse, Response},
    Json,
};

use super::server::AppState;
use super::stream::sse_events;
use super::types::{PromptRequest, RelayQuery};
use crate::error::Error;
use crate::relay::RelayMode;

/// Handle POST /call-api
///
/// Streams the upstream answer as SSE, or returns it as plain text in
/// aggregate mode. The mode comes from `?mode=` or the configured default.
pub async fn call_api(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
    Json(request): Json<PromptRequest>,
) -> Result<Response, Error> {
    let mode = query.mode.unwrap_or(state.config.relay.mode);
    let content = request.into_content().inspect_err(|_| {
        tracing::info!("Rejected request with empty content");
    })?;

    tracing::info!(
        mode = mode.as_str(),
        content_len = content.len(),
        "Received relay request"
    );

    match mode {
        RelayMode::Aggregate => {
            let text = state.driver.aggregate(content).await?;
            Ok(text.into_response())
        }
        RelayMode::Incremental | RelayMode::Raw => {
            let events = state.driver.relay(content, mode);
            Ok(Sse::new(sse_events(events)).into_response())
        }
    }
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "prompt-relay"
    }))
}
