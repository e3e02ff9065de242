//! Storage seam for the asset registry and audit trail.
//!
//! The engine talks to persistence only through [`AssetStore`]. Backends
//! must honour two guarantees:
//!
//! - `insert_asset` writes the new row and its creation entry atomically.
//! - `commit_state` / `commit_fields` write the asset row and its history
//!   entry in one atomic unit, and only if the row's `version` still equals
//!   the version the caller read. A stale version (or a row deleted in the
//!   meantime) fails with [`CoreError::ConcurrentModification`].
//! - Reads are never served from a cache.

use async_trait::async_trait;

use crate::asset::{Asset, AssetFieldUpdate, NewAsset};
use crate::audit::{Actor, ActorProfile, HistoryEntry, NewHistoryEntry};
use crate::error::CoreError;
use crate::lifecycle::AssetState;
use crate::types::DbId;

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<(), CoreError>;

    /// Resolve a user id to a known actor.
    async fn resolve_actor(&self, user_id: DbId) -> Result<Option<ActorProfile>, CoreError>;

    /// Insert a new asset row in `state` together with its creation entry
    /// (`previous_state = None`). Both are written or neither is. Duplicate
    /// asset numbers fail with [`CoreError::Conflict`].
    async fn insert_asset(
        &self,
        asset: &NewAsset,
        state: AssetState,
        actor: Actor,
        reason: Option<&str>,
    ) -> Result<(Asset, HistoryEntry), CoreError>;

    /// Find a non-deleted asset by asset number.
    async fn find_active(&self, asset_number: &str) -> Result<Option<Asset>, CoreError>;

    /// Find an asset by asset number, soft-deleted or not.
    async fn find_any(&self, asset_number: &str) -> Result<Option<Asset>, CoreError>;

    /// Find every non-deleted asset among `asset_numbers`. Missing numbers
    /// are simply absent from the result; order is unspecified.
    async fn find_active_many(&self, asset_numbers: &[String]) -> Result<Vec<Asset>, CoreError>;

    /// Conditionally move `asset` to `new_state` and append `entry`.
    async fn commit_state(
        &self,
        asset: &Asset,
        new_state: AssetState,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError>;

    /// Conditionally apply allow-listed field changes and append `entry`.
    async fn commit_fields(
        &self,
        asset: &Asset,
        update: &AssetFieldUpdate,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError>;

    /// Append a history entry on its own.
    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry, CoreError>;

    /// Up to `limit` entries for an asset, most recent first.
    async fn history(&self, asset_id: DbId, limit: i64) -> Result<Vec<HistoryEntry>, CoreError>;

    /// The newest entry for an asset.
    async fn latest_history(&self, asset_id: DbId) -> Result<Option<HistoryEntry>, CoreError>;

    /// Set or clear the soft-delete marker. Returns `false` when the row was
    /// already in the requested state.
    async fn set_deleted(&self, asset_id: DbId, deleted: bool) -> Result<bool, CoreError>;
}
