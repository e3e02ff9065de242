pub mod assets;
pub mod health;
pub mod lifecycles;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /lifecycles                                   rule table per asset type
///
/// /assets                                       register (POST)
/// /assets/bulk                                  bulk transition / field update (POST)
/// /assets/{asset_number}                        get, soft delete
/// /assets/{asset_number}/restore                restore (POST)
/// /assets/{asset_number}/transition             single hop (POST)
/// /assets/{asset_number}/advance                multi-hop walk (POST)
/// /assets/{asset_number}/history                audit trail, newest first
/// /assets/{asset_number}/consistency            stored vs. history-derived state
/// /assets/{asset_number}/repair                 rewrite stored state from history (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/lifecycles", lifecycles::router())
        .nest("/assets", assets::router())
}
