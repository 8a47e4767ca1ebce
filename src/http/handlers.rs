//! Control-surface handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::bridge::SessionState;
use crate::error::{BridgeError, BridgeResult};
use crate::http::response::ErrorBody;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::records::{Record, SubmitOutcome};

/// A site login as handed to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub mock_mode: bool,
    pub cached_references: usize,
    pub connections: Vec<ConnectionStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub index: usize,
    pub location: String,
    pub primary: bool,
    pub state: SessionState,
}

/// /server_request
pub async fn fetch_command(State(state): State<AppState>) -> Result<Response, BridgeError> {
    let command = state.bridge.fetch_next_command().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], command).into_response())
}

/// /server_response
pub async fn submit_answer(State(state): State<AppState>, body: Bytes) -> Json<bool> {
    if let Err(e) = state.bridge.submit_answer(&body) {
        metrics::record_answer_dropped("invalid");
        tracing::warn!(error = %e, "Dropping collector answer");
    }
    Json(true)
}

/// /send_cv
pub async fn send_cv(State(state): State<AppState>, body: Bytes) -> Result<Json<SubmitOutcome>, BridgeError> {
    let record = Record::parse(&body)?;
    let outcome = state.records.submit(&record).await?;
    Ok(Json(outcome))
}

fn require_reference(body: &str) -> BridgeResult<&str> {
    if body.is_empty() {
        return Err(BridgeError::InvalidInput(
            "reference number cannot be an empty string".into(),
        ));
    }
    Ok(body)
}

/// /set_cached_reference
pub async fn set_cached_reference(State(state): State<AppState>, body: String) -> Result<Json<bool>, BridgeError> {
    let reference = require_reference(&body)?;
    state.cache.put(reference, state.cache_config.long_ttl());
    Ok(Json(true))
}

/// /set_short_cached_reference
pub async fn set_short_cached_reference(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<bool>, BridgeError> {
    let reference = require_reference(&body)?;
    state.cache.put(reference, state.cache_config.short_ttl());
    Ok(Json(true))
}

/// /get_cached_reference
pub async fn get_cached_reference(State(state): State<AppState>, body: String) -> Result<Json<bool>, BridgeError> {
    let reference = require_reference(&body)?;
    Ok(Json(state.cache.exists(reference)))
}

/// /users
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<SiteUser>> {
    Json(state.users.as_ref().clone())
}

/// /status
pub async fn status(State(state): State<AppState>) -> Json<BridgeStatus> {
    let connections = state
        .sessions
        .iter()
        .enumerate()
        .map(|(index, session)| ConnectionStatus {
            index,
            location: session.location.clone(),
            primary: session.primary,
            state: session.state.get(),
        })
        .collect();

    Json(BridgeStatus {
        mock_mode: state.records.pool().is_none(),
        cached_references: state.cache.len(),
        connections,
    })
}

pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no route for {} {}", method, uri.path()),
        }),
    )
}
