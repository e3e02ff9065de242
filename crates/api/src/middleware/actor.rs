//! Actor extraction from the identity provider's header.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the provider has stamped the caller's user id on it. The id is
//! trusted as-is here and checked against known users by the engine.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use custody_core::audit::Actor;
use custody_core::error::CoreError;
use custody_core::types::DbId;

use crate::error::AppError;

/// Header carrying the authenticated user id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user performing a mutating request.
///
/// ```ignore
/// async fn my_handler(ActorId(actor): ActorId) -> AppResult<Json<()>> {
///     tracing::info!(actor_id = ?actor.user_id(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActorId(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for ActorId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {ACTOR_HEADER} header"
                )))
            })?;

        let user_id: DbId = raw.trim().parse().map_err(|_| {
            AppError::Core(CoreError::Unauthorized(format!(
                "Invalid {ACTOR_HEADER} header: expected a numeric user id"
            )))
        })?;

        Ok(ActorId(Actor::User(user_id)))
    }
}
