use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use custody_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `custody_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Request body failed declarative validation.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, message) = match &self {
            AppError::Core(core) => {
                let status = match core {
                    CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CoreError::InvalidTransition { .. }
                    | CoreError::InvalidAssetIdentifiers { .. }
                    | CoreError::UnknownActor(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::ConcurrentModification { .. } | CoreError::Conflict(_) => {
                        StatusCode::CONFLICT
                    }
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    CoreError::Storage(_) | CoreError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };

                if let CoreError::InvalidAssetIdentifiers { missing } = core {
                    details = Some(json!({ "missing": missing }));
                }

                let message = if core.is_client_safe() {
                    core.to_string()
                } else {
                    tracing::error!(error = %core, "Internal core error");
                    "An internal error occurred".to_string()
                };
                (status, core.code(), message)
            }

            AppError::InvalidInput(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                errors.to_string(),
            ),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_core::lifecycle::{AssetState, AssetType};
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn domain_errors_map_to_statuses() {
        let cases = [
            (CoreError::asset_not_found("LT-1"), StatusCode::NOT_FOUND),
            (
                CoreError::InvalidTransition {
                    asset_type: AssetType::Laptop,
                    from: AssetState::Available,
                    to: AssetState::Issued,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CoreError::ConcurrentModification { asset_id: 1 },
                StatusCode::CONFLICT,
            ),
            (CoreError::UnknownActor(9), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            let code = err.code();
            let (status, body) = render(AppError::Core(err)).await;
            assert_eq!(status, expected);
            assert_eq!(body["code"], code);
        }
    }

    #[tokio::test]
    async fn storage_detail_is_not_leaked() {
        let (status, body) =
            render(AppError::Core(CoreError::Storage("connection refused on 10.0.0.5".into())))
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "STORAGE_FAILURE");
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn missing_identifiers_are_listed() {
        let (status, body) = render(AppError::Core(CoreError::InvalidAssetIdentifiers {
            missing: vec!["X".into()],
        }))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"]["missing"][0], "X");
    }
}
