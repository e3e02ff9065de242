//! [`AssetStore`] backed by Postgres.
//!
//! Every write that touches history runs in a transaction: the asset
//! `INSERT` or version-guarded `UPDATE` and the history `INSERT` commit
//! together or not at all.

use async_trait::async_trait;
use custody_core::asset::{Asset, AssetFieldUpdate, NewAsset};
use custody_core::audit::{Actor, ActorProfile, HistoryEntry, NewHistoryEntry};
use custody_core::error::CoreError;
use custody_core::lifecycle::AssetState;
use custody_core::store::AssetStore;
use custody_core::types::DbId;

use crate::models::asset::AssetRow;
use crate::repositories::{AssetHistoryRepo, AssetRepo, UserRepo};
use crate::{map_db_error, DbPool};

#[derive(Clone)]
pub struct PgAssetStore {
    pool: DbPool,
}

impl PgAssetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Finish a guarded write: a missing row means the guard failed.
    fn guarded(asset: &Asset, row: Option<AssetRow>) -> Result<Asset, CoreError> {
        match row {
            Some(row) => Asset::try_from(row),
            None => Err(CoreError::ConcurrentModification { asset_id: asset.id }),
        }
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(map_db_error)
    }

    async fn resolve_actor(&self, user_id: DbId) -> Result<Option<ActorProfile>, CoreError> {
        Ok(UserRepo::find_by_id(&self.pool, user_id)
            .await
            .map_err(map_db_error)?
            .map(ActorProfile::from))
    }

    async fn insert_asset(
        &self,
        asset: &NewAsset,
        state: AssetState,
        actor: Actor,
        reason: Option<&str>,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row = AssetRepo::create(&mut tx, asset, state)
            .await
            .map_err(map_db_error)?;
        let creation = NewHistoryEntry {
            asset_id: row.id,
            previous_state: None,
            new_state: state,
            actor,
            reason: reason.map(str::to_string),
            details: None,
        };
        let written = AssetHistoryRepo::create(&mut tx, &creation)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok((Asset::try_from(row)?, HistoryEntry::try_from(written)?))
    }

    async fn find_active(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
        AssetRepo::find_active_by_number(&self.pool, asset_number)
            .await
            .map_err(map_db_error)?
            .map(Asset::try_from)
            .transpose()
    }

    async fn find_any(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
        AssetRepo::find_by_number_include_deleted(&self.pool, asset_number)
            .await
            .map_err(map_db_error)?
            .map(Asset::try_from)
            .transpose()
    }

    async fn find_active_many(&self, asset_numbers: &[String]) -> Result<Vec<Asset>, CoreError> {
        AssetRepo::find_active_by_numbers(&self.pool, asset_numbers)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Asset::try_from)
            .collect()
    }

    async fn commit_state(
        &self,
        asset: &Asset,
        new_state: AssetState,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row = AssetRepo::update_state_if_version(&mut tx, asset.id, new_state, asset.version)
            .await
            .map_err(map_db_error)?;
        let updated = Self::guarded(asset, row)?;

        let written = AssetHistoryRepo::create(&mut tx, entry)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok((updated, HistoryEntry::try_from(written)?))
    }

    async fn commit_fields(
        &self,
        asset: &Asset,
        update: &AssetFieldUpdate,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row = AssetRepo::update_fields_if_version(&mut tx, asset.id, update, asset.version)
            .await
            .map_err(map_db_error)?;
        let updated = Self::guarded(asset, row)?;

        let written = AssetHistoryRepo::create(&mut tx, entry)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok((updated, HistoryEntry::try_from(written)?))
    }

    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry, CoreError> {
        if !AssetRepo::exists(&self.pool, entry.asset_id)
            .await
            .map_err(map_db_error)?
        {
            return Err(CoreError::NotFound {
                entity: "Asset",
                key: entry.asset_id.to_string(),
            });
        }
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        let written = AssetHistoryRepo::create(&mut conn, entry)
            .await
            .map_err(map_db_error)?;
        HistoryEntry::try_from(written)
    }

    async fn history(&self, asset_id: DbId, limit: i64) -> Result<Vec<HistoryEntry>, CoreError> {
        AssetHistoryRepo::list_for_asset(&self.pool, asset_id, limit)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(HistoryEntry::try_from)
            .collect()
    }

    async fn latest_history(&self, asset_id: DbId) -> Result<Option<HistoryEntry>, CoreError> {
        AssetHistoryRepo::latest_for_asset(&self.pool, asset_id)
            .await
            .map_err(map_db_error)?
            .map(HistoryEntry::try_from)
            .transpose()
    }

    async fn set_deleted(&self, asset_id: DbId, deleted: bool) -> Result<bool, CoreError> {
        let changed = if deleted {
            AssetRepo::soft_delete(&self.pool, asset_id).await
        } else {
            AssetRepo::restore(&self.pool, asset_id).await
        };
        changed.map_err(map_db_error)
    }
}
