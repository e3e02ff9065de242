use std::collections::{BTreeMap, BTreeSet};

use axum::extract::State;
use axum::Json;
use custody_core::lifecycle::{AssetState, AssetType};
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

/// One asset type's lifecycle as the rule table sees it.
#[derive(Debug, Serialize)]
pub struct LifecycleView {
    pub asset_type: AssetType,
    pub initial_state: Option<AssetState>,
    pub states: Vec<AssetState>,
    pub return_to_start: bool,
    /// Legal next states keyed by current state.
    pub transitions: BTreeMap<AssetState, BTreeSet<AssetState>>,
}

/// GET /api/v1/lifecycles
pub async fn list_lifecycles(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<LifecycleView>>> {
    let rules = state.engine.rules();
    let views = rules
        .lifecycles()
        .into_iter()
        .map(|(asset_type, lifecycle)| LifecycleView {
            asset_type,
            initial_state: rules.initial_state(asset_type),
            states: lifecycle.states.clone(),
            return_to_start: lifecycle.return_to_start,
            transitions: lifecycle
                .states
                .iter()
                .map(|&s| (s, rules.valid_next_states(asset_type, s)))
                .collect(),
        })
        .collect();

    Json(DataResponse { data: views })
}
