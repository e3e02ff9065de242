//! Route definitions for assets. All routes are mounted under `/assets`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assets, bulk};
use crate::state::AppState;

/// Asset routes mounted at `/assets`.
///
/// ```text
/// POST   /                             -> create_asset
/// POST   /bulk                         -> run_bulk
/// GET    /{asset_number}               -> get_asset
/// DELETE /{asset_number}               -> delete_asset
/// POST   /{asset_number}/restore       -> restore_asset
/// POST   /{asset_number}/transition    -> transition_asset
/// POST   /{asset_number}/advance       -> advance_asset
/// GET    /{asset_number}/history       -> get_history
/// GET    /{asset_number}/consistency   -> check_consistency
/// POST   /{asset_number}/repair        -> repair_asset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(assets::create_asset))
        .route("/bulk", post(bulk::run_bulk))
        .route(
            "/{asset_number}",
            get(assets::get_asset).delete(assets::delete_asset),
        )
        .route("/{asset_number}/restore", post(assets::restore_asset))
        .route("/{asset_number}/transition", post(assets::transition_asset))
        .route("/{asset_number}/advance", post(assets::advance_asset))
        .route("/{asset_number}/history", get(assets::get_history))
        .route("/{asset_number}/consistency", get(assets::check_consistency))
        .route("/{asset_number}/repair", post(assets::repair_asset))
}
