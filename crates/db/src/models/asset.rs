//! Asset registry row.

use custody_core::asset::{Asset, AssignmentType};
use custody_core::error::CoreError;
use custody_core::lifecycle::{AssetState, AssetType};
use custody_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub id: DbId,
    pub asset_number: String,
    pub asset_type: String,
    pub state: String,
    pub assigned_to: Option<String>,
    pub assignment_type: Option<String>,
    pub location: Option<String>,
    pub version: i64,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AssetRow> for Asset {
    type Error = CoreError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            asset_type: AssetType::from_str_value(&row.asset_type).map_err(CoreError::Internal)?,
            state: AssetState::from_str_value(&row.state).map_err(CoreError::Internal)?,
            assignment_type: row
                .assignment_type
                .as_deref()
                .map(AssignmentType::from_str_value)
                .transpose()
                .map_err(CoreError::Internal)?,
            asset_number: row.asset_number,
            assigned_to: row.assigned_to,
            location: row.location,
            version: row.version,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
