//! REST handlers.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use argus_alerts::{AlertDraft, AlertPatch};
use argus_core::{
    ActionToken, Notification, NotificationDraft, NotificationType, PositionSide, Priority, Source,
};
use argus_store::ListQuery;
use argus_trading::OpenPositionRequest;

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
    pub symbol: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub notifications: Vec<Notification>,
    pub total: usize,
    pub unread_count: usize,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let notifications = state
        .store
        .list(ListQuery {
            limit: params.limit,
            unread_only: params.unread_only,
            symbol: params.symbol.as_deref().map(argus_core::canonicalize),
        })
        .await?;
    let stats = state.store.stats().await?;
    Ok(Json(ListResponse {
        notifications,
        total: stats.total,
        unread_count: stats.unread_count,
    }))
}

pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

/// Creation body: a notification draft. Unknown action tokens are
/// rejected.
#[derive(Debug, Deserialize)]
pub struct CreateNotification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub source: Source,
    pub title: String,
    pub message: String,
    pub priority: Option<Priority>,
    pub symbol: Option<String>,
    pub external_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<String>,
    pub confidence_score: Option<f64>,
    pub urgency_score: Option<f64>,
    pub promise_score: Option<f64>,
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(body): Json<CreateNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let mut actions = Vec::with_capacity(body.actions.len());
    for raw in &body.actions {
        actions.push(ActionToken::from_str(raw)?);
    }

    let mut draft = NotificationDraft::new(body.kind, body.source, &body.title, &body.message);
    draft.priority = body.priority;
    draft.symbol = body.symbol;
    draft.external_id = body.external_id;
    draft.metadata = body.metadata;
    draft.actions = actions;
    draft.confidence_score = body.confidence_score;
    draft.urgency_score = body.urgency_score;
    draft.promise_score = body.promise_score;

    let outcome = state.enricher.enrich(draft).await?;
    let status = if outcome.is_duplicate() {
        // Idempotent by dedup key: same payload, same notification.
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.notification().clone())))
}

#[derive(Debug, Deserialize)]
pub struct PatchNotification {
    pub read: Option<bool>,
    pub responded: Option<bool>,
    pub response_action: Option<String>,
}

pub async fn patch_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchNotification>,
) -> ApiResult<Json<Notification>> {
    if body.responded.unwrap_or(false) {
        let action = body
            .response_action
            .as_deref()
            .ok_or_else(|| ApiError::InvalidInput("responded requires response_action".into()))?;
        ActionToken::from_str(action)?;
        let n = state.store.respond(&id, action, None).await?;
        return Ok(Json(n));
    }
    if body.read.unwrap_or(false) {
        let n = state.store.mark_read(&id).await?;
        return Ok(Json(n));
    }
    // Nothing to change: return the current record.
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

#[derive(Debug, Deserialize)]
pub struct RespondParams {
    pub action: String,
    pub custom_message: Option<String>,
}

pub async fn respond_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RespondParams>,
) -> ApiResult<Json<Notification>> {
    ActionToken::from_str(&params.action)?;
    let n = state
        .store
        .respond(&id, &params.action, params.custom_message)
        .await?;
    Ok(Json(n))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn notification_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<argus_store::StoreStats>> {
    Ok(Json(state.store.stats().await?))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AlertListParams {
    pub symbol: Option<String>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> Json<Vec<argus_core::Alert>> {
    Json(state.alerts.list(params.symbol.as_deref()))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(draft): Json<AlertDraft>,
) -> ApiResult<(StatusCode, Json<argus_core::Alert>)> {
    let alert = state.alerts.create(draft)?;
    info!(alert = %alert.id, symbol = %alert.symbol, "Alert created");
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn patch_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AlertPatch>,
) -> ApiResult<Json<argus_core::Alert>> {
    Ok(Json(state.alerts.update(&id, patch)?))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.alerts.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Trading proxy
// ---------------------------------------------------------------------------

pub async fn get_balance(
    State(state): State<AppState>,
) -> ApiResult<Json<argus_trading::Balance>> {
    Ok(Json(state.trading.get_balance().await?))
}

pub async fn get_positions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<argus_core::Position>>> {
    Ok(Json(state.trading.get_positions().await?))
}

#[derive(Debug, Deserialize)]
pub struct OpenPositionBody {
    pub symbol: String,
    pub side: String,
    pub amount: Decimal,
    pub stop_loss_percent: Option<f64>,
    pub trailing_stop_percent: Option<f64>,
}

pub async fn open_position(
    State(state): State<AppState>,
    Json(body): Json<OpenPositionBody>,
) -> ApiResult<(StatusCode, Json<argus_core::Position>)> {
    let side = PositionSide::from_str(&body.side)?;
    let request = OpenPositionRequest {
        symbol: body.symbol,
        side,
        amount: body.amount,
        stop_loss_percent: body.stop_loss_percent,
        trailing_stop_percent: body.trailing_stop_percent,
    };
    let position = state.trading.open_position(&request).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

pub async fn close_position(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<argus_core::Position>> {
    // Axum has already percent-decoded the path segment.
    Ok(Json(state.trading.close_position(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StopLossBody {
    pub stop_loss_percent: f64,
}

pub async fn set_stop_loss(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StopLossBody>,
) -> ApiResult<Json<argus_core::Position>> {
    Ok(Json(
        state
            .trading
            .set_stop_loss(&id, body.stop_loss_percent)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct TrailingStopBody {
    pub trailing_stop_percent: f64,
}

pub async fn set_trailing_stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrailingStopBody>,
) -> ApiResult<Json<argus_core::Position>> {
    Ok(Json(
        state
            .trading
            .set_trailing_stop(&id, body.trailing_stop_percent)
            .await?,
    ))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub async fn system_status(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let mut pollers = Vec::new();
    for handle in state.pollers.values() {
        if let Some(status) = handle.status().await {
            pollers.push(status);
        }
    }
    pollers.sort_by(|a, b| a.name.cmp(&b.name));

    let stats = state.store.stats().await?;
    Ok(Json(json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "store": stats,
        "pollers": pollers,
        "open_positions": state.positions.len(),
        "voice_providers": state.tts.provider_status(),
    })))
}

pub async fn source_control(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let handle = state
        .pollers
        .get(name.as_str())
        .ok_or_else(|| ApiError::NotFound(format!("source {name}")))?;

    match action.as_str() {
        "start" => handle.start().await,
        "stop" => handle.stop().await,
        other => {
            return Err(ApiError::InvalidInput(format!(
                "action must be start or stop, got {other}"
            )))
        }
    }
    info!(source = %name, %action, "Source control applied");
    Ok(Json(json!({ "source": name, "action": action, "ok": true })))
}

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

pub async fn voice_providers(
    State(state): State<AppState>,
) -> Json<Vec<argus_tts::ProviderStatus>> {
    Json(state.tts.provider_status())
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeBody {
    pub text: String,
    #[serde(default)]
    pub priority: Priority,
    pub provider: Option<String>,
}

pub async fn synthesize(
    State(state): State<AppState>,
    Json(body): Json<SynthesizeBody>,
) -> ApiResult<Response> {
    let synthesis = state
        .tts
        .synthesize(&body.text, body.priority, body.provider.as_deref())
        .await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, synthesis.content_type)],
        synthesis.audio,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

pub async fn metrics() -> Response {
    match argus_telemetry::encode_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
