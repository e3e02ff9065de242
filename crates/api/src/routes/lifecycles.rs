use axum::routing::get;
use axum::Router;

use crate::handlers::lifecycles;
use crate::state::AppState;

/// Read-only view of the rule table, mounted at `/lifecycles`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(lifecycles::list_lifecycles))
}
