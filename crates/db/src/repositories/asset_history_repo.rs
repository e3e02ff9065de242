//! Repository for the append-only `asset_history` table.
//!
//! There are no update or delete methods; the table rejects both with a
//! trigger.

use custody_core::audit::NewHistoryEntry;
use custody_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::asset_history::AssetHistoryRow;

/// Column list for history reads. Expects `asset_history` aliased as `h`
/// and `users` as `u`.
const COLUMNS: &str = "\
    h.id, h.asset_id, h.previous_state, h.new_state, h.actor_id, \
    u.display_name AS actor_name, h.reason, h.details, h.created_at";

pub struct AssetHistoryRepo;

impl AssetHistoryRepo {
    /// Append one entry.
    ///
    /// `created_at` never precedes the asset's newest existing entry, so
    /// ordering by time and ordering by id agree.
    pub async fn create(
        conn: &mut PgConnection,
        entry: &NewHistoryEntry,
    ) -> Result<AssetHistoryRow, sqlx::Error> {
        let query = format!(
            "WITH inserted AS ( \
                INSERT INTO asset_history \
                    (asset_id, previous_state, new_state, actor_id, reason, details, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6, GREATEST(NOW(), \
                    (SELECT MAX(created_at) FROM asset_history WHERE asset_id = $1))) \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM inserted h LEFT JOIN users u ON u.id = h.actor_id"
        );
        sqlx::query_as::<_, AssetHistoryRow>(&query)
            .bind(entry.asset_id)
            .bind(entry.previous_state.map(|s| s.as_str()))
            .bind(entry.new_state.as_str())
            .bind(entry.actor.user_id())
            .bind(entry.reason.as_deref())
            .bind(&entry.details)
            .fetch_one(conn)
            .await
    }

    /// Up to `limit` entries for an asset, most recent first.
    pub async fn list_for_asset(
        pool: &PgPool,
        asset_id: DbId,
        limit: i64,
    ) -> Result<Vec<AssetHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM asset_history h \
             LEFT JOIN users u ON u.id = h.actor_id \
             WHERE h.asset_id = $1 \
             ORDER BY h.id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, AssetHistoryRow>(&query)
            .bind(asset_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The newest entry for an asset.
    pub async fn latest_for_asset(
        pool: &PgPool,
        asset_id: DbId,
    ) -> Result<Option<AssetHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM asset_history h \
             LEFT JOIN users u ON u.id = h.actor_id \
             WHERE h.asset_id = $1 \
             ORDER BY h.id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, AssetHistoryRow>(&query)
            .bind(asset_id)
            .fetch_optional(pool)
            .await
    }
}
