//! Asset history row. Immutable once written, so there is no `updated_at`.

use custody_core::audit::HistoryEntry;
use custody_core::error::CoreError;
use custody_core::lifecycle::AssetState;
use custody_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from `asset_history`, joined with the actor's display name.
#[derive(Debug, Clone, FromRow)]
pub struct AssetHistoryRow {
    pub id: DbId,
    pub asset_id: DbId,
    pub previous_state: Option<String>,
    pub new_state: String,
    pub actor_id: Option<DbId>,
    pub actor_name: Option<String>,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl TryFrom<AssetHistoryRow> for HistoryEntry {
    type Error = CoreError;

    fn try_from(row: AssetHistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryEntry {
            id: row.id,
            asset_id: row.asset_id,
            previous_state: row
                .previous_state
                .as_deref()
                .map(AssetState::from_str_value)
                .transpose()
                .map_err(CoreError::Internal)?,
            new_state: AssetState::from_str_value(&row.new_state).map_err(CoreError::Internal)?,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            reason: row.reason,
            details: row.details,
            created_at: row.created_at,
        })
    }
}
