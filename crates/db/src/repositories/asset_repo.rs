//! Repository for the `assets` table.

use custody_core::asset::{AssetFieldUpdate, NewAsset};
use custody_core::lifecycle::AssetState;
use custody_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::asset::AssetRow;

/// Column list for `assets` queries.
const COLUMNS: &str = "\
    id, asset_number, asset_type, state, assigned_to, \
    assignment_type, location, version, deleted_at, \
    created_at, updated_at";

/// Provides registry and conditional-write operations for assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Insert a new asset in `state`. Violates `uq_assets_asset_number` on a
    /// duplicate number.
    pub async fn create(
        conn: &mut PgConnection,
        input: &NewAsset,
        state: AssetState,
    ) -> Result<AssetRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets \
                (asset_number, asset_type, state, assigned_to, assignment_type, location) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(&input.asset_number)
            .bind(input.asset_type.as_str())
            .bind(state.as_str())
            .bind(input.assigned_to.as_deref())
            .bind(input.assignment_type.map(|t| t.as_str()))
            .bind(input.location.as_deref())
            .fetch_one(conn)
            .await
    }

    /// Find a non-deleted asset by asset number.
    pub async fn find_active_by_number(
        pool: &PgPool,
        asset_number: &str,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assets WHERE asset_number = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(asset_number)
            .fetch_optional(pool)
            .await
    }

    /// Find an asset by asset number, including soft-deleted rows. Used on
    /// restore.
    pub async fn find_by_number_include_deleted(
        pool: &PgPool,
        asset_number: &str,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE asset_number = $1");
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(asset_number)
            .fetch_optional(pool)
            .await
    }

    /// Find every non-deleted asset whose number is in `asset_numbers`.
    pub async fn find_active_by_numbers(
        pool: &PgPool,
        asset_numbers: &[String],
    ) -> Result<Vec<AssetRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assets \
             WHERE asset_number = ANY($1) AND deleted_at IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(asset_numbers)
            .fetch_all(pool)
            .await
    }

    /// Move a live asset to `state` if its version still equals
    /// `expected_version`. Returns `None` when the guard did not match.
    pub async fn update_state_if_version(
        conn: &mut PgConnection,
        id: DbId,
        state: AssetState,
        expected_version: i64,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!(
            "UPDATE assets SET state = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $3 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .bind(state.as_str())
            .bind(expected_version)
            .fetch_optional(conn)
            .await
    }

    /// Apply allow-listed field changes under the same version guard as
    /// [`Self::update_state_if_version`].
    ///
    /// Each column takes a "set" flag so `NULL` can mean "clear" rather than
    /// "leave unchanged".
    pub async fn update_fields_if_version(
        conn: &mut PgConnection,
        id: DbId,
        update: &AssetFieldUpdate,
        expected_version: i64,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!(
            "UPDATE assets SET \
                location = CASE WHEN $3 THEN $4 ELSE location END, \
                assigned_to = CASE WHEN $5 THEN $6 ELSE assigned_to END, \
                assignment_type = CASE WHEN $7 THEN $8 ELSE assignment_type END, \
                version = version + 1, \
                updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(update.location.is_some())
            .bind(update.location.clone().flatten())
            .bind(update.assigned_to.is_some())
            .bind(update.assigned_to.clone().flatten())
            .bind(update.assignment_type.is_some())
            .bind(update.assignment_type.flatten().map(|t| t.as_str()))
            .fetch_optional(conn)
            .await
    }

    /// Soft-delete an asset. Returns `true` if a row was marked.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET deleted_at = NOW(), version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted asset. Returns `true` if a row was restored.
    pub async fn restore(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET deleted_at = NULL, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether an asset row exists at all, deleted or not.
    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM assets WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
