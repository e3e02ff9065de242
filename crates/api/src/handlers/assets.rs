//! Handlers for single-asset registration, lifecycle moves, history and
//! consistency tooling.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use custody_core::asset::{AssignmentType, NewAsset};
use custody_core::engine::TransitionRequest;
use custody_core::lifecycle::{AssetState, AssetType};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::actor::ActorId;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAssetBody {
    #[validate(length(min = 1, max = 32))]
    pub asset_number: String,
    pub asset_type: AssetType,
    /// Defaults to the type's initial state.
    pub state: Option<AssetState>,
    #[validate(length(max = 200))]
    pub assigned_to: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionBody {
    #[serde(alias = "targetState")]
    pub target_state: AssetState,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl TransitionBody {
    fn into_request(self, actor: ActorId) -> TransitionRequest {
        TransitionRequest {
            target: self.target_state,
            actor: actor.0,
            reason: self.reason,
            details: self.details,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// POST /api/v1/assets
///
/// Register an asset and write its creation history entry.
pub async fn create_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Json(body): Json<RegisterAssetBody>,
) -> AppResult<impl IntoResponse> {
    body.validate()?;

    let new = NewAsset {
        asset_number: body.asset_number,
        asset_type: body.asset_type,
        state: body.state,
        assigned_to: body.assigned_to,
        assignment_type: body.assignment_type,
        location: body.location,
    };
    let created = state
        .engine
        .register_asset(new, actor.0, body.reason)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/assets/{asset_number}
pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
) -> AppResult<impl IntoResponse> {
    let asset = state.engine.find_asset(&asset_number).await?;
    Ok(Json(DataResponse { data: asset }))
}

/// DELETE /api/v1/assets/{asset_number}
///
/// Soft delete. The row and its history stay in place.
pub async fn delete_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
) -> AppResult<StatusCode> {
    state
        .engine
        .soft_delete_asset(&asset_number, actor.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/assets/{asset_number}/restore
pub async fn restore_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
) -> AppResult<impl IntoResponse> {
    let asset = state.engine.restore_asset(&asset_number, actor.0).await?;
    Ok(Json(DataResponse { data: asset }))
}

// ---------------------------------------------------------------------------
// Lifecycle moves
// ---------------------------------------------------------------------------

/// POST /api/v1/assets/{asset_number}/transition
///
/// Move one hop. Anything but an immediate next state is rejected.
pub async fn transition_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
    Json(body): Json<TransitionBody>,
) -> AppResult<impl IntoResponse> {
    body.validate()?;
    let request = body.into_request(actor);
    let applied = state
        .engine
        .request_transition(&asset_number, &request)
        .await?;
    Ok(Json(DataResponse { data: applied }))
}

/// POST /api/v1/assets/{asset_number}/advance
///
/// Walk every intermediate hop to the target, one history entry per hop.
pub async fn advance_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
    Json(body): Json<TransitionBody>,
) -> AppResult<impl IntoResponse> {
    body.validate()?;
    let request = body.into_request(actor);
    let applied = state
        .engine
        .advance_to_state(&asset_number, &request)
        .await?;
    Ok(Json(DataResponse { data: applied }))
}

// ---------------------------------------------------------------------------
// History and consistency
// ---------------------------------------------------------------------------

/// GET /api/v1/assets/{asset_number}/history?limit=
pub async fn get_history(
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let entries = state.engine.history(&asset_number, query.limit).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/assets/{asset_number}/consistency
pub async fn check_consistency(
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.check_consistency(&asset_number).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/assets/{asset_number}/repair
pub async fn repair_asset(
    actor: ActorId,
    State(state): State<AppState>,
    Path(asset_number): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.repair_state(&asset_number, actor.0).await?;
    Ok(Json(DataResponse { data: report }))
}
