//! Handler for batch operations over many assets.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use custody_core::bulk::{BulkOperation, BulkRequest};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::actor::ActorId;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkBody {
    pub asset_identifiers: Vec<String>,
    /// `stateTransition` or `bulkFieldUpdate`.
    pub operation: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Reject the whole batch if any asset cannot take the transition.
    #[serde(default)]
    pub strict: bool,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// POST /api/v1/assets/bulk
pub async fn run_bulk(
    actor: ActorId,
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> AppResult<impl IntoResponse> {
    body.validate()?;

    let request = BulkRequest {
        operation: BulkOperation::from_parts(&body.operation, body.payload)?,
        asset_identifiers: body.asset_identifiers,
        actor: actor.0,
        reason: body.reason,
    };

    let result = if body.strict {
        state.bulk.execute_strict(request).await?
    } else {
        state.bulk.execute(request).await?
    };

    Ok(Json(DataResponse { data: result }))
}
