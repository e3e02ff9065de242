use crate::lifecycle::{AssetState, AssetType};
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} '{key}'")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid transition for {asset_type}: {from} -> {to}")]
    InvalidTransition {
        asset_type: AssetType,
        from: AssetState,
        to: AssetState,
    },

    #[error("Unknown asset identifiers: {}", missing.join(", "))]
    InvalidAssetIdentifiers { missing: Vec<String> },

    #[error("Asset {asset_id} was modified concurrently")]
    ConcurrentModification { asset_id: DbId },

    #[error("Unknown actor: {0}")]
    UnknownActor(DbId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for an asset lookup miss keyed by asset number.
    pub fn asset_not_found(asset_number: &str) -> Self {
        CoreError::NotFound {
            entity: "Asset",
            key: asset_number.to_string(),
        }
    }

    /// Stable machine-readable code, shared by HTTP responses and bulk
    /// failure reports.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::InvalidAssetIdentifiers { .. } => "INVALID_ASSET_IDENTIFIERS",
            CoreError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            CoreError::UnknownActor(_) => "UNKNOWN_ACTOR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Storage(_) => "STORAGE_FAILURE",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message is safe to hand to a caller verbatim.
    ///
    /// Storage and internal failures carry backend detail that stays in logs.
    pub fn is_client_safe(&self) -> bool {
        !matches!(self, CoreError::Storage(_) | CoreError::Internal(_))
    }
}
