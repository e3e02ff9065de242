//! In-memory [`AssetStore`] for development and tests.
//!
//! A single mutex guards all tables, so every method is atomic with respect
//! to every other. Version checks behave exactly like the database backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::asset::{Asset, AssetFieldUpdate, NewAsset};
use crate::audit::{Actor, ActorProfile, HistoryEntry, NewHistoryEntry};
use crate::error::CoreError;
use crate::lifecycle::AssetState;
use crate::store::AssetStore;
use crate::types::{DbId, Timestamp};

#[derive(Default)]
struct Tables {
    assets: HashMap<DbId, Asset>,
    by_number: HashMap<String, DbId>,
    history: Vec<HistoryEntry>,
    users: HashMap<DbId, String>,
    next_asset_id: DbId,
    next_history_id: DbId,
}

impl Tables {
    fn asset_by_number(&self, asset_number: &str) -> Option<&Asset> {
        self.by_number
            .get(asset_number)
            .and_then(|id| self.assets.get(id))
    }

    /// A timestamp no earlier than the asset's newest entry.
    fn history_timestamp(&self, asset_id: DbId) -> Timestamp {
        let now = Utc::now();
        self.history
            .iter()
            .rev()
            .find(|e| e.asset_id == asset_id)
            .map_or(now, |last| now.max(last.created_at))
    }

    fn push_history(&mut self, entry: &NewHistoryEntry) -> HistoryEntry {
        self.next_history_id += 1;
        let actor_id = entry.actor.user_id();
        let written = HistoryEntry {
            id: self.next_history_id,
            asset_id: entry.asset_id,
            previous_state: entry.previous_state,
            new_state: entry.new_state,
            actor_id,
            actor_name: actor_id.and_then(|id| self.users.get(&id).cloned()),
            reason: entry.reason.clone(),
            details: entry.details.clone(),
            created_at: self.history_timestamp(entry.asset_id),
        };
        self.history.push(written.clone());
        written
    }

    /// The live row for `expected`, provided nobody wrote it since it was
    /// read.
    fn current_row(&mut self, expected: &Asset) -> Result<&mut Asset, CoreError> {
        match self.assets.get_mut(&expected.id) {
            Some(row) if row.version == expected.version && row.deleted_at.is_none() => Ok(row),
            _ => Err(CoreError::ConcurrentModification {
                asset_id: expected.id,
            }),
        }
    }
}

/// Mutex-guarded in-process store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so it resolves as an actor.
    pub async fn add_user(&self, id: DbId, display_name: &str) {
        self.tables
            .lock()
            .await
            .users
            .insert(id, display_name.to_string());
    }

    /// Overwrite a stored state without touching history.
    ///
    /// Only exists to let tests fabricate the drift the repair tool fixes.
    pub async fn force_state(&self, asset_id: DbId, state: AssetState) {
        if let Some(row) = self.tables.lock().await.assets.get_mut(&asset_id) {
            row.state = state;
            row.version += 1;
        }
    }
}

#[async_trait]
impl AssetStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn resolve_actor(&self, user_id: DbId) -> Result<Option<ActorProfile>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&user_id).map(|name| ActorProfile {
            id: user_id,
            display_name: name.clone(),
        }))
    }

    async fn insert_asset(
        &self,
        asset: &NewAsset,
        state: AssetState,
        actor: Actor,
        reason: Option<&str>,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tables = self.tables.lock().await;
        if tables.by_number.contains_key(&asset.asset_number) {
            return Err(CoreError::Conflict(format!(
                "Asset number '{}' is already registered",
                asset.asset_number
            )));
        }

        tables.next_asset_id += 1;
        let now = Utc::now();
        let row = Asset {
            id: tables.next_asset_id,
            asset_number: asset.asset_number.clone(),
            asset_type: asset.asset_type,
            state,
            assigned_to: asset.assigned_to.clone(),
            assignment_type: asset.assignment_type,
            location: asset.location.clone(),
            version: 1,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.by_number.insert(row.asset_number.clone(), row.id);
        tables.assets.insert(row.id, row.clone());

        let written = tables.push_history(&NewHistoryEntry {
            asset_id: row.id,
            previous_state: None,
            new_state: state,
            actor,
            reason: reason.map(str::to_string),
            details: None,
        });
        Ok((row, written))
    }

    async fn find_active(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .asset_by_number(asset_number)
            .filter(|a| !a.is_deleted())
            .cloned())
    }

    async fn find_any(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.asset_by_number(asset_number).cloned())
    }

    async fn find_active_many(&self, asset_numbers: &[String]) -> Result<Vec<Asset>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(asset_numbers
            .iter()
            .filter_map(|n| tables.asset_by_number(n))
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect())
    }

    async fn commit_state(
        &self,
        asset: &Asset,
        new_state: AssetState,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables.current_row(asset)?;
        row.state = new_state;
        row.version += 1;
        row.updated_at = Utc::now();
        let updated = row.clone();

        let written = tables.push_history(entry);
        Ok((updated, written))
    }

    async fn commit_fields(
        &self,
        asset: &Asset,
        update: &AssetFieldUpdate,
        entry: &NewHistoryEntry,
    ) -> Result<(Asset, HistoryEntry), CoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables.current_row(asset)?;
        update.apply_to(row);
        row.version += 1;
        row.updated_at = Utc::now();
        let updated = row.clone();

        let written = tables.push_history(entry);
        Ok((updated, written))
    }

    async fn append_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry, CoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.assets.contains_key(&entry.asset_id) {
            return Err(CoreError::NotFound {
                entity: "Asset",
                key: entry.asset_id.to_string(),
            });
        }
        Ok(tables.push_history(entry))
    }

    async fn history(&self, asset_id: DbId, limit: i64) -> Result<Vec<HistoryEntry>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .history
            .iter()
            .rev()
            .filter(|e| e.asset_id == asset_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn latest_history(&self, asset_id: DbId) -> Result<Option<HistoryEntry>, CoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .history
            .iter()
            .rev()
            .find(|e| e.asset_id == asset_id)
            .cloned())
    }

    async fn set_deleted(&self, asset_id: DbId, deleted: bool) -> Result<bool, CoreError> {
        let mut tables = self.tables.lock().await;
        let Some(row) = tables.assets.get_mut(&asset_id) else {
            return Ok(false);
        };
        if row.is_deleted() == deleted {
            return Ok(false);
        }
        row.deleted_at = deleted.then(Utc::now);
        row.version += 1;
        row.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AssetType;
    use assert_matches::assert_matches;

    fn laptop(number: &str) -> NewAsset {
        NewAsset {
            asset_number: number.into(),
            asset_type: AssetType::Laptop,
            state: None,
            assigned_to: None,
            assignment_type: None,
            location: None,
        }
    }

    async fn insert(store: &InMemoryStore, number: &str) -> Result<Asset, CoreError> {
        store
            .insert_asset(&laptop(number), AssetState::Available, Actor::System, None)
            .await
            .map(|(asset, _)| asset)
    }

    fn entry(asset: &Asset, new_state: AssetState) -> NewHistoryEntry {
        NewHistoryEntry {
            asset_id: asset.id,
            previous_state: Some(asset.state),
            new_state,
            actor: Actor::System,
            reason: None,
            details: None,
        }
    }

    #[tokio::test]
    async fn duplicate_asset_number_conflicts() {
        let store = InMemoryStore::new();
        let first = insert(&store, "LT-1").await.unwrap();
        let dup = insert(&store, "LT-1").await;
        assert_matches!(dup, Err(CoreError::Conflict(_)));
        assert_eq!(store.history(first.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_writes_creation_entry_with_row() {
        let store = InMemoryStore::new();
        store.add_user(7, "Ada Admin").await;
        let (asset, entry) = store
            .insert_asset(
                &laptop("LT-1"),
                AssetState::Available,
                Actor::User(7),
                Some("registered"),
            )
            .await
            .unwrap();

        assert_eq!(entry.asset_id, asset.id);
        assert_eq!(entry.previous_state, None);
        assert_eq!(entry.new_state, AssetState::Available);
        assert_eq!(entry.actor_name.as_deref(), Some("Ada Admin"));
        assert_eq!(store.latest_history(asset.id).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let read = insert(&store, "LT-1").await.unwrap();

        let (updated, _) = store
            .commit_state(&read, AssetState::SignedOut, &entry(&read, AssetState::SignedOut))
            .await
            .unwrap();
        assert_eq!(updated.version, read.version + 1);

        let stale = store
            .commit_state(&read, AssetState::SignedOut, &entry(&read, AssetState::SignedOut))
            .await;
        assert_matches!(stale, Err(CoreError::ConcurrentModification { asset_id }) if asset_id == read.id);
        assert_eq!(store.history(read.id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_hidden_and_not_writable() {
        let store = InMemoryStore::new();
        let read = insert(&store, "LT-1").await.unwrap();

        assert!(store.set_deleted(read.id, true).await.unwrap());
        assert!(!store.set_deleted(read.id, true).await.unwrap());
        assert!(store.find_active("LT-1").await.unwrap().is_none());
        assert!(store.find_any("LT-1").await.unwrap().is_some());

        let write = store
            .commit_state(&read, AssetState::SignedOut, &entry(&read, AssetState::SignedOut))
            .await;
        assert_matches!(write, Err(CoreError::ConcurrentModification { .. }));
    }

    #[tokio::test]
    async fn history_timestamps_never_go_backwards() {
        let store = InMemoryStore::new();
        let mut asset = insert(&store, "LT-1").await.unwrap();
        for next in [AssetState::SignedOut, AssetState::Building, AssetState::ReadyToGo] {
            let (updated, _) = store
                .commit_state(&asset, next, &entry(&asset, next))
                .await
                .unwrap();
            asset = updated;
        }

        let entries = store.history(asset.id, 10).await.unwrap();
        for pair in entries.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
            assert!(pair[0].id > pair[1].id);
        }
    }
}
