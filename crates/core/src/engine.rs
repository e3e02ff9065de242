//! The transition engine: sole writer of asset state and history.
//!
//! Every write follows the same shape: read the current row (never cached),
//! validate against the rule table, then hand the store a conditional write
//! keyed on the row version that was just read. Two callers racing on the
//! same asset cannot both win; the loser sees
//! [`CoreError::ConcurrentModification`] and may retry.
//!
//! Interactive callers use [`TransitionEngine::request_transition`], which
//! moves exactly one hop. [`TransitionEngine::advance_to_state`] walks a
//! multi-hop path explicitly and writes one history entry per hop.

use std::sync::Arc;

use serde::Serialize;

use crate::asset::{validate_asset_number, Asset, AssetFieldUpdate, NewAsset};
use crate::audit::{
    Actor, AuditTrail, HistoryEntry, NewHistoryEntry, REASON_REGISTERED, REASON_REPAIRED,
};
use crate::error::CoreError;
use crate::lifecycle::{AssetState, TransitionRules};
use crate::store::AssetStore;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// A requested lifecycle change for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub target: AssetState,
    pub actor: Actor,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// The outcome of one committed write.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedTransition {
    pub asset: Asset,
    pub entry: HistoryEntry,
}

/// Stored state versus the state derived from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub asset_number: String,
    pub stored_state: AssetState,
    /// `None` when the asset has no history at all.
    pub derived_state: Option<AssetState>,
    pub consistent: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn AssetStore>,
    rules: Arc<TransitionRules>,
    audit: AuditTrail,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn AssetStore>, rules: TransitionRules) -> Self {
        let audit = AuditTrail::new(Arc::clone(&store));
        Self {
            store,
            rules: Arc::new(rules),
            audit,
        }
    }

    pub fn rules(&self) -> &TransitionRules {
        &self.rules
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    /// Fail with [`CoreError::UnknownActor`] unless `actor` resolves.
    pub async fn ensure_actor(&self, actor: Actor) -> Result<(), CoreError> {
        if let Actor::User(id) = actor {
            if self.store.resolve_actor(id).await?.is_none() {
                return Err(CoreError::UnknownActor(id));
            }
        }
        Ok(())
    }

    /// Load a live asset or fail with `NotFound`.
    pub async fn find_asset(&self, asset_number: &str) -> Result<Asset, CoreError> {
        self.store
            .find_active(asset_number)
            .await?
            .ok_or_else(|| CoreError::asset_not_found(asset_number))
    }

    // -- Registration --------------------------------------------------------

    /// Register a new asset and write its creation entry in the same unit.
    ///
    /// The asset starts in its type's initial state unless the caller names
    /// another state of the same lifecycle.
    pub async fn register_asset(
        &self,
        new: NewAsset,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<AppliedTransition, CoreError> {
        validate_asset_number(&new.asset_number)?;
        self.ensure_actor(actor).await?;

        let lifecycle = self.rules.lifecycle_order(new.asset_type);
        let state = match new.state {
            Some(s) if lifecycle.contains(&s) => s,
            Some(s) => {
                return Err(CoreError::Validation(format!(
                    "{s} is not part of the {} lifecycle",
                    new.asset_type
                )))
            }
            None => self.rules.initial_state(new.asset_type).ok_or_else(|| {
                CoreError::Validation(format!("No lifecycle configured for {}", new.asset_type))
            })?,
        };

        let reason = reason.unwrap_or_else(|| REASON_REGISTERED.to_string());
        let (asset, entry) = self
            .store
            .insert_asset(&new, state, actor, Some(&reason))
            .await?;

        tracing::info!(
            asset_id = asset.id,
            asset_number = %asset.asset_number,
            asset_type = %asset.asset_type,
            state = %state,
            "Asset registered",
        );

        Ok(AppliedTransition { asset, entry })
    }

    // -- Transitions ---------------------------------------------------------

    /// Interactive single-asset transition. Alias of [`Self::step_transition`].
    pub async fn request_transition(
        &self,
        asset_number: &str,
        request: &TransitionRequest,
    ) -> Result<AppliedTransition, CoreError> {
        self.step_transition(asset_number, request).await
    }

    /// Move an asset exactly one legal hop.
    ///
    /// Targets that are not an immediate next state (including the current
    /// state itself) fail with [`CoreError::InvalidTransition`] and leave the
    /// asset and its history untouched.
    pub async fn step_transition(
        &self,
        asset_number: &str,
        request: &TransitionRequest,
    ) -> Result<AppliedTransition, CoreError> {
        self.ensure_actor(request.actor).await?;
        let asset = self.find_asset(asset_number).await?;
        self.step_loaded(asset, request).await
    }

    async fn step_loaded(
        &self,
        asset: Asset,
        request: &TransitionRequest,
    ) -> Result<AppliedTransition, CoreError> {
        let from = asset.state;
        if !self.rules.is_legal(asset.asset_type, from, request.target) {
            tracing::debug!(
                asset_number = %asset.asset_number,
                from = %from,
                to = %request.target,
                "Transition rejected",
            );
            return Err(CoreError::InvalidTransition {
                asset_type: asset.asset_type,
                from,
                to: request.target,
            });
        }

        let entry = NewHistoryEntry {
            asset_id: asset.id,
            previous_state: Some(from),
            new_state: request.target,
            actor: request.actor,
            reason: request.reason.clone(),
            details: request.details.clone(),
        };
        let (asset, entry) = self
            .store
            .commit_state(&asset, request.target, &entry)
            .await?;

        tracing::info!(
            asset_id = asset.id,
            asset_number = %asset.asset_number,
            from = %from,
            to = %asset.state,
            actor_id = ?request.actor.user_id(),
            "Asset transitioned",
        );

        Ok(AppliedTransition { asset, entry })
    }

    /// Walk the shortest legal path to `request.target`, one committed hop
    /// at a time.
    ///
    /// Each hop is its own atomic write; if a later hop fails the earlier
    /// ones stay committed and the error is returned.
    pub async fn advance_to_state(
        &self,
        asset_number: &str,
        request: &TransitionRequest,
    ) -> Result<Vec<AppliedTransition>, CoreError> {
        self.ensure_actor(request.actor).await?;
        let asset = self.find_asset(asset_number).await?;

        let path = self
            .rules
            .path(asset.asset_type, asset.state, request.target)
            .ok_or(CoreError::InvalidTransition {
                asset_type: asset.asset_type,
                from: asset.state,
                to: request.target,
            })?;

        tracing::debug!(
            asset_number = %asset.asset_number,
            hops = path.len(),
            "Advancing asset along path",
        );

        let mut applied = Vec::with_capacity(path.len());
        let mut current = asset;
        for hop in path {
            let step = TransitionRequest {
                target: hop,
                ..request.clone()
            };
            let done = self.step_loaded(current, &step).await?;
            current = done.asset.clone();
            applied.push(done);
        }

        Ok(applied)
    }

    /// Apply allow-listed field changes and record them in history.
    ///
    /// The entry keeps the state unchanged and carries the changed fields in
    /// `details`.
    pub async fn update_fields(
        &self,
        asset_number: &str,
        update: &AssetFieldUpdate,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<AppliedTransition, CoreError> {
        self.ensure_actor(actor).await?;
        let asset = self.find_asset(asset_number).await?;
        let details = serde_json::to_value(update)
            .map_err(|e| CoreError::Internal(format!("Failed to encode field update: {e}")))?;

        let entry = NewHistoryEntry {
            asset_id: asset.id,
            previous_state: Some(asset.state),
            new_state: asset.state,
            actor,
            reason,
            details: Some(serde_json::json!({ "fields": details })),
        };
        let (asset, entry) = self.store.commit_fields(&asset, update, &entry).await?;

        tracing::info!(
            asset_id = asset.id,
            asset_number = %asset.asset_number,
            "Asset fields updated",
        );

        Ok(AppliedTransition { asset, entry })
    }

    // -- Reads ---------------------------------------------------------------

    /// History for a live asset, most recent first.
    pub async fn history(
        &self,
        asset_number: &str,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let asset = self.find_asset(asset_number).await?;
        self.audit.entries_for(asset.id, limit).await
    }

    /// State recorded by the asset's newest history entry.
    pub async fn most_recent_state(&self, asset_number: &str) -> Result<AssetState, CoreError> {
        let asset = self.find_asset(asset_number).await?;
        self.audit.most_recent_state(asset.id).await
    }

    // -- Consistency tooling -------------------------------------------------

    /// Compare the stored state with the state derived from history.
    pub async fn check_consistency(
        &self,
        asset_number: &str,
    ) -> Result<ConsistencyReport, CoreError> {
        let asset = self.find_asset(asset_number).await?;
        self.report_for(&asset).await
    }

    async fn report_for(&self, asset: &Asset) -> Result<ConsistencyReport, CoreError> {
        let derived_state = self
            .store
            .latest_history(asset.id)
            .await?
            .map(|e| e.new_state);

        Ok(ConsistencyReport {
            asset_number: asset.asset_number.clone(),
            stored_state: asset.state,
            derived_state,
            consistent: derived_state.map_or(true, |d| d == asset.state),
        })
    }

    /// Rewrite the stored state to match history.
    ///
    /// This is the out-of-band repair path: it bypasses the rule table and
    /// records the correction as its own entry. Consistent assets are left
    /// alone.
    pub async fn repair_state(
        &self,
        asset_number: &str,
        actor: Actor,
    ) -> Result<ConsistencyReport, CoreError> {
        self.ensure_actor(actor).await?;
        let asset = self.find_asset(asset_number).await?;
        let report = self.report_for(&asset).await?;

        let Some(derived) = report.derived_state.filter(|_| !report.consistent) else {
            return Ok(report);
        };

        let entry = NewHistoryEntry {
            asset_id: asset.id,
            previous_state: Some(asset.state),
            new_state: derived,
            actor,
            reason: Some(REASON_REPAIRED.to_string()),
            details: Some(serde_json::json!({ "repair": true })),
        };
        let (asset, _) = self.store.commit_state(&asset, derived, &entry).await?;

        tracing::warn!(
            asset_id = asset.id,
            asset_number = %asset.asset_number,
            from = %report.stored_state,
            to = %derived,
            "Asset state repaired from history",
        );

        self.report_for(&asset).await
    }

    // -- Soft delete ---------------------------------------------------------

    /// Hide an asset from active queries. Its row and history persist.
    pub async fn soft_delete_asset(&self, asset_number: &str, actor: Actor) -> Result<(), CoreError> {
        self.ensure_actor(actor).await?;
        let asset = self.find_asset(asset_number).await?;
        self.store.set_deleted(asset.id, true).await?;
        tracing::info!(
            asset_id = asset.id,
            actor_id = ?actor.user_id(),
            "Asset soft-deleted",
        );
        Ok(())
    }

    /// Bring a soft-deleted asset back.
    pub async fn restore_asset(&self, asset_number: &str, actor: Actor) -> Result<Asset, CoreError> {
        self.ensure_actor(actor).await?;
        let asset = self
            .store
            .find_any(asset_number)
            .await?
            .ok_or_else(|| CoreError::asset_not_found(asset_number))?;

        if !self.store.set_deleted(asset.id, false).await? {
            return Err(CoreError::Conflict(format!(
                "Asset '{asset_number}' is not deleted"
            )));
        }
        tracing::info!(
            asset_id = asset.id,
            actor_id = ?actor.user_id(),
            "Asset restored",
        );
        self.find_asset(asset_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AssetType;
    use crate::memory::InMemoryStore;
    use assert_matches::assert_matches;

    const USER: Actor = Actor::User(1);

    async fn engine() -> (TransitionEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.add_user(1, "Ada Admin").await;
        store.add_user(2, "Bo Builder").await;
        let engine = TransitionEngine::new(store.clone(), TransitionRules::standard());
        (engine, store)
    }

    /// Store wrapper that parks every caller right after its asset read, so
    /// concurrent engine calls all read before any of them writes.
    struct InterleavingStore {
        inner: InMemoryStore,
        fail_append: bool,
        reads: std::sync::atomic::AtomicUsize,
        writes: std::sync::atomic::AtomicUsize,
        max_reads_before_write: std::sync::atomic::AtomicUsize,
    }

    impl InterleavingStore {
        /// Most asset reads observed before the first write landed.
        fn reads_in_flight(&self) -> usize {
            self.max_reads_before_write
                .load(std::sync::atomic::Ordering::SeqCst)
        }

        fn record_write(&self) {
            use std::sync::atomic::Ordering::SeqCst;
            if self.writes.fetch_add(1, SeqCst) == 0 {
                self.max_reads_before_write
                    .store(self.reads.load(SeqCst), SeqCst);
            }
        }
    }

    #[async_trait::async_trait]
    impl AssetStore for InterleavingStore {
        async fn health_check(&self) -> Result<(), CoreError> {
            self.inner.health_check().await
        }

        async fn resolve_actor(
            &self,
            user_id: crate::types::DbId,
        ) -> Result<Option<crate::audit::ActorProfile>, CoreError> {
            self.inner.resolve_actor(user_id).await
        }

        async fn insert_asset(
            &self,
            asset: &NewAsset,
            state: AssetState,
            actor: Actor,
            reason: Option<&str>,
        ) -> Result<(Asset, HistoryEntry), CoreError> {
            self.inner.insert_asset(asset, state, actor, reason).await
        }

        async fn find_active(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
            let found = self.inner.find_active(asset_number).await?;
            if found.is_some() && self.writes.load(std::sync::atomic::Ordering::SeqCst) == 0 {
                self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
            Ok(found)
        }

        async fn find_any(&self, asset_number: &str) -> Result<Option<Asset>, CoreError> {
            self.inner.find_any(asset_number).await
        }

        async fn find_active_many(
            &self,
            asset_numbers: &[String],
        ) -> Result<Vec<Asset>, CoreError> {
            self.inner.find_active_many(asset_numbers).await
        }

        async fn commit_state(
            &self,
            asset: &Asset,
            new_state: AssetState,
            entry: &NewHistoryEntry,
        ) -> Result<(Asset, HistoryEntry), CoreError> {
            self.record_write();
            self.inner.commit_state(asset, new_state, entry).await
        }

        async fn commit_fields(
            &self,
            asset: &Asset,
            update: &AssetFieldUpdate,
            entry: &NewHistoryEntry,
        ) -> Result<(Asset, HistoryEntry), CoreError> {
            self.record_write();
            self.inner.commit_fields(asset, update, entry).await
        }

        async fn append_history(
            &self,
            entry: &NewHistoryEntry,
        ) -> Result<HistoryEntry, CoreError> {
            if self.fail_append {
                return Err(CoreError::Storage("history table unavailable".into()));
            }
            self.inner.append_history(entry).await
        }

        async fn history(
            &self,
            asset_id: crate::types::DbId,
            limit: i64,
        ) -> Result<Vec<HistoryEntry>, CoreError> {
            self.inner.history(asset_id, limit).await
        }

        async fn latest_history(
            &self,
            asset_id: crate::types::DbId,
        ) -> Result<Option<HistoryEntry>, CoreError> {
            self.inner.latest_history(asset_id).await
        }

        async fn set_deleted(
            &self,
            asset_id: crate::types::DbId,
            deleted: bool,
        ) -> Result<bool, CoreError> {
            self.inner.set_deleted(asset_id, deleted).await
        }
    }

    async fn interleaving_engine(fail_append: bool) -> (TransitionEngine, Arc<InterleavingStore>) {
        let inner = InMemoryStore::new();
        inner.add_user(1, "Ada Admin").await;
        inner.add_user(2, "Bo Builder").await;
        let store = Arc::new(InterleavingStore {
            inner,
            fail_append,
            reads: Default::default(),
            writes: Default::default(),
            max_reads_before_write: Default::default(),
        });
        let engine = TransitionEngine::new(store.clone(), TransitionRules::standard());
        (engine, store)
    }

    fn new_asset(number: &str, asset_type: AssetType) -> NewAsset {
        NewAsset {
            asset_number: number.into(),
            asset_type,
            state: None,
            assigned_to: None,
            assignment_type: None,
            location: Some("HQ".into()),
        }
    }

    fn to(target: AssetState) -> TransitionRequest {
        TransitionRequest {
            target,
            actor: USER,
            reason: None,
            details: None,
        }
    }

    async fn assert_consistent(engine: &TransitionEngine, number: &str) {
        let asset = engine.find_asset(number).await.unwrap();
        assert_eq!(engine.most_recent_state(number).await.unwrap(), asset.state);
        assert!(engine.check_consistency(number).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn laptop_end_to_end() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let signed_out = engine
            .request_transition(
                "LT-1",
                &TransitionRequest {
                    target: AssetState::SignedOut,
                    actor: USER,
                    reason: Some("build".into()),
                    details: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(signed_out.asset.state, AssetState::SignedOut);
        assert_eq!(signed_out.entry.previous_state, Some(AssetState::Available));
        assert_eq!(signed_out.entry.new_state, AssetState::SignedOut);
        assert_eq!(signed_out.entry.actor_id, Some(1));
        assert_eq!(signed_out.entry.actor_name.as_deref(), Some("Ada Admin"));
        assert_eq!(signed_out.entry.reason.as_deref(), Some("build"));
        assert_consistent(&engine, "LT-1").await;

        let building = engine
            .request_transition("LT-1", &to(AssetState::Building))
            .await
            .unwrap();
        assert_eq!(building.asset.state, AssetState::Building);

        let ready = engine
            .request_transition("LT-1", &to(AssetState::ReadyToGo))
            .await
            .unwrap();
        assert_eq!(ready.asset.state, AssetState::ReadyToGo);
        assert_consistent(&engine, "LT-1").await;

        // creation + three hops
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn creation_entry_has_no_previous_state() {
        let (engine, _) = engine().await;
        let created = engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), Actor::System, None)
            .await
            .unwrap();
        assert_eq!(created.asset.state, AssetState::Available);
        assert_eq!(created.entry.previous_state, None);
        assert_eq!(created.entry.actor_id, None);
        assert_eq!(created.entry.reason.as_deref(), Some(REASON_REGISTERED));
        assert_consistent(&engine, "LT-1").await;
    }

    #[tokio::test]
    async fn registration_rejects_state_outside_lifecycle() {
        let (engine, _) = engine().await;
        let mut monitor = new_asset("MON-1", AssetType::Monitor);
        monitor.state = Some(AssetState::Building);
        assert_matches!(
            engine.register_asset(monitor, USER, None).await,
            Err(CoreError::Validation(_))
        );

        let mut issued = new_asset("MON-2", AssetType::Monitor);
        issued.state = Some(AssetState::Issued);
        let created = engine.register_asset(issued, USER, None).await.unwrap();
        assert_eq!(created.asset.state, AssetState::Issued);
    }

    #[tokio::test]
    async fn registration_rejects_duplicates_and_bad_numbers() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();
        assert_matches!(
            engine
                .register_asset(new_asset("LT-1", AssetType::Tablet), USER, None)
                .await,
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            engine
                .register_asset(new_asset("bad number", AssetType::Tablet), USER, None)
                .await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn transition_to_current_state_always_fails() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        for _ in 0..3 {
            assert_matches!(
                engine
                    .request_transition("LT-1", &to(AssetState::Available))
                    .await,
                Err(CoreError::InvalidTransition { from: AssetState::Available, to: AssetState::Available, .. })
            );
        }
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skipping_ahead_fails_and_writes_nothing() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        assert_matches!(
            engine.request_transition("LT-1", &to(AssetState::Issued)).await,
            Err(CoreError::InvalidTransition { .. })
        );
        let asset = engine.find_asset("LT-1").await.unwrap();
        assert_eq!(asset.state, AssetState::Available);
        assert_eq!(asset.version, 1);
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn monitor_lifecycle_skips_building() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("MON-1", AssetType::Monitor), USER, None)
            .await
            .unwrap();

        engine
            .request_transition("MON-1", &to(AssetState::SignedOut))
            .await
            .unwrap();
        assert_matches!(
            engine
                .request_transition("MON-1", &to(AssetState::Building))
                .await,
            Err(CoreError::InvalidTransition { asset_type: AssetType::Monitor, .. })
        );
        engine
            .request_transition("MON-1", &to(AssetState::ReadyToGo))
            .await
            .unwrap();
        let issued = engine
            .request_transition("MON-1", &to(AssetState::Issued))
            .await
            .unwrap();
        assert_eq!(issued.asset.state, AssetState::Issued);
        assert_consistent(&engine, "MON-1").await;
    }

    #[tokio::test]
    async fn return_edge_works_for_every_type() {
        let (engine, _) = engine().await;
        for (i, t) in AssetType::ALL.into_iter().enumerate() {
            let number = format!("A-{i}");
            let mut asset = new_asset(&number, t);
            asset.state = Some(AssetState::Issued);
            engine.register_asset(asset, USER, None).await.unwrap();

            let back = engine
                .request_transition(&number, &to(AssetState::Available))
                .await
                .unwrap();
            assert_eq!(back.asset.state, AssetState::Available, "{t}");
        }
    }

    #[tokio::test]
    async fn unknown_actor_is_rejected_before_any_write() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let request = TransitionRequest {
            actor: Actor::User(999),
            ..to(AssetState::SignedOut)
        };
        assert_matches!(
            engine.request_transition("LT-1", &request).await,
            Err(CoreError::UnknownActor(999))
        );
        assert_eq!(
            engine.find_asset("LT-1").await.unwrap().state,
            AssetState::Available
        );
    }

    #[tokio::test]
    async fn missing_and_deleted_assets_are_not_found() {
        let (engine, _) = engine().await;
        assert_matches!(
            engine.request_transition("NOPE", &to(AssetState::SignedOut)).await,
            Err(CoreError::NotFound { .. })
        );

        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();
        engine.soft_delete_asset("LT-1", USER).await.unwrap();
        assert_matches!(
            engine.request_transition("LT-1", &to(AssetState::SignedOut)).await,
            Err(CoreError::NotFound { .. })
        );

        let restored = engine.restore_asset("LT-1", USER).await.unwrap();
        assert!(restored.deleted_at.is_none());
        assert_matches!(
            engine.restore_asset("LT-1", USER).await,
            Err(CoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn advance_writes_one_entry_per_hop() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let hops = engine
            .advance_to_state("LT-1", &to(AssetState::Issued))
            .await
            .unwrap();
        let states: Vec<_> = hops.iter().map(|h| h.entry.new_state).collect();
        assert_eq!(
            states,
            vec![
                AssetState::SignedOut,
                AssetState::Building,
                AssetState::ReadyToGo,
                AssetState::Issued
            ]
        );
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 5);
        assert_consistent(&engine, "LT-1").await;
    }

    #[tokio::test]
    async fn advance_to_current_state_fails() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();
        assert_matches!(
            engine
                .advance_to_state("LT-1", &to(AssetState::Available))
                .await,
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn concurrent_requests_have_exactly_one_winner() {
        let (engine, store) = interleaving_engine(false).await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let first = TransitionRequest {
            actor: Actor::User(1),
            ..to(AssetState::SignedOut)
        };
        let second = TransitionRequest {
            actor: Actor::User(2),
            ..to(AssetState::SignedOut)
        };
        let (a, b) = futures::join!(
            engine.request_transition("LT-1", &first),
            engine.request_transition("LT-1", &second),
        );

        // Both calls read version 1 before either wrote.
        assert_eq!(store.reads_in_flight(), 2);
        let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = if a.is_ok() { b } else { a };
        assert_matches!(loser, Err(CoreError::ConcurrentModification { .. }));

        // creation + one transition
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 2);
        assert_consistent(&engine, "LT-1").await;
    }

    #[tokio::test]
    async fn racing_transition_and_field_update_have_one_winner() {
        let (engine, store) = interleaving_engine(false).await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let update = AssetFieldUpdate {
            location: Some(Some("Dock".into())),
            ..Default::default()
        };
        let signed_out = to(AssetState::SignedOut);
        let (moved, edited) = futures::join!(
            engine.request_transition("LT-1", &signed_out),
            engine.update_fields("LT-1", &update, Actor::User(2), None),
        );

        assert_eq!(store.reads_in_flight(), 2);
        assert_eq!(moved.is_ok() as usize + edited.is_ok() as usize, 1);
        if moved.is_ok() {
            assert_matches!(edited, Err(CoreError::ConcurrentModification { .. }));
        } else {
            assert_matches!(moved, Err(CoreError::ConcurrentModification { .. }));
        }
        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 2);
        assert_consistent(&engine, "LT-1").await;
    }

    #[tokio::test]
    async fn registration_does_not_depend_on_standalone_append() {
        let (engine, _) = interleaving_engine(true).await;

        let created = engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();
        assert_eq!(created.entry.asset_id, created.asset.id);
        assert_eq!(created.entry.previous_state, None);

        assert_eq!(engine.history("LT-1", None).await.unwrap().len(), 1);
        assert_consistent(&engine, "LT-1").await;
        assert_matches!(
            engine
                .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
                .await,
            Err(CoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn stale_read_loses_to_committed_write() {
        let (engine, store) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let stale = engine.find_asset("LT-1").await.unwrap();
        engine
            .request_transition("LT-1", &to(AssetState::SignedOut))
            .await
            .unwrap();

        let entry = NewHistoryEntry {
            asset_id: stale.id,
            previous_state: Some(stale.state),
            new_state: AssetState::SignedOut,
            actor: USER,
            reason: None,
            details: None,
        };
        assert_matches!(
            store.commit_state(&stale, AssetState::SignedOut, &entry).await,
            Err(CoreError::ConcurrentModification { .. })
        );
        assert_consistent(&engine, "LT-1").await;
    }

    #[tokio::test]
    async fn repair_realigns_stored_state_with_history() {
        let (engine, store) = engine().await;
        let created = engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();
        engine
            .request_transition("LT-1", &to(AssetState::SignedOut))
            .await
            .unwrap();

        store.force_state(created.asset.id, AssetState::Issued).await;
        let drift = engine.check_consistency("LT-1").await.unwrap();
        assert!(!drift.consistent);
        assert_eq!(drift.stored_state, AssetState::Issued);
        assert_eq!(drift.derived_state, Some(AssetState::SignedOut));

        let repaired = engine.repair_state("LT-1", USER).await.unwrap();
        assert!(repaired.consistent);
        assert_eq!(repaired.stored_state, AssetState::SignedOut);

        let newest = &engine.history("LT-1", Some(1)).await.unwrap()[0];
        assert_eq!(newest.previous_state, Some(AssetState::Issued));
        assert_eq!(newest.reason.as_deref(), Some(REASON_REPAIRED));
    }

    #[tokio::test]
    async fn field_update_keeps_state_and_records_details() {
        let (engine, _) = engine().await;
        engine
            .register_asset(new_asset("LT-1", AssetType::Laptop), USER, None)
            .await
            .unwrap();

        let update = AssetFieldUpdate {
            location: Some(Some("Warehouse B".into())),
            ..Default::default()
        };
        let applied = engine
            .update_fields("LT-1", &update, USER, Some("restock".into()))
            .await
            .unwrap();
        assert_eq!(applied.asset.location.as_deref(), Some("Warehouse B"));
        assert_eq!(applied.entry.previous_state, Some(AssetState::Available));
        assert_eq!(applied.entry.new_state, AssetState::Available);
        assert_eq!(
            applied.entry.details,
            Some(serde_json::json!({ "fields": { "location": "Warehouse B" } }))
        );
        assert_consistent(&engine, "LT-1").await;
    }
}
