//! Asset history: the append-only audit trail of lifecycle changes.
//!
//! Entries are written by the transition engine and never updated or
//! deleted through the normal surface. The most recent entry's `new_state`
//! must always agree with the asset's stored state; [`AuditTrail`] exposes
//! that derived read so callers can check the invariant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lifecycle::AssetState;
use crate::store::AssetStore;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Page size used when a history read does not specify a limit.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Upper bound on a single history read.
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Reason recorded on the creation entry when none is supplied.
pub const REASON_REGISTERED: &str = "registered";

/// Reason recorded by the history repair tool.
pub const REASON_REPAIRED: &str = "state repaired from history";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Who performed a change. Identity is resolved by the external auth
/// provider; the core only carries the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    User(DbId),
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<DbId> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::System => None,
        }
    }
}

/// A resolved user reference, as known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorProfile {
    pub id: DbId,
    pub display_name: String,
}

/// One immutable audit record.
///
/// `id` is assigned in insertion order and breaks ties between entries that
/// share a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: DbId,
    pub asset_id: DbId,
    pub previous_state: Option<AssetState>,
    pub new_state: AssetState,
    /// `None` for system-initiated changes.
    pub actor_id: Option<DbId>,
    pub actor_name: Option<String>,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// An entry about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub asset_id: DbId,
    pub previous_state: Option<AssetState>,
    pub new_state: AssetState,
    pub actor: Actor,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// Clamp a caller-supplied page size into `1..=MAX_HISTORY_LIMIT`.
pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

// ---------------------------------------------------------------------------
// Writer / reader
// ---------------------------------------------------------------------------

/// Audit trail access over an [`AssetStore`].
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AssetStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    /// Append a standalone entry.
    ///
    /// An entry without a previous state is only accepted as the first entry
    /// of an asset's life; any later entry must chain from the current tail.
    pub async fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry, CoreError> {
        let tail = self.store.latest_history(entry.asset_id).await?;

        match (entry.previous_state, tail) {
            (None, Some(_)) => {
                return Err(CoreError::Validation(format!(
                    "Asset {} already has history; previous state is required",
                    entry.asset_id
                )))
            }
            (Some(prev), Some(tail)) if tail.new_state != prev => {
                return Err(CoreError::Validation(format!(
                    "Previous state {prev} does not match recorded state {}",
                    tail.new_state
                )))
            }
            _ => {}
        }

        let written = self.store.append_history(entry).await?;
        tracing::debug!(
            asset_id = written.asset_id,
            history_id = written.id,
            new_state = %written.new_state,
            "History entry appended",
        );
        Ok(written)
    }

    /// State recorded by the newest entry.
    pub async fn most_recent_state(&self, asset_id: DbId) -> Result<AssetState, CoreError> {
        self.store
            .latest_history(asset_id)
            .await?
            .map(|e| e.new_state)
            .ok_or(CoreError::NotFound {
                entity: "AssetHistory",
                key: asset_id.to_string(),
            })
    }

    /// Entries for an asset, most recent first.
    pub async fn entries_for(
        &self,
        asset_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        self.store
            .history(asset_id, clamp_history_limit(limit))
            .await
    }
}
