//! Bulk operation coordination.
//!
//! A bulk request names a set of assets and one operation. Existence is
//! all-or-nothing: if any identifier fails to resolve to a live asset the
//! whole request is rejected before anything is written. Application is
//! per-asset: each asset's write is its own atomic unit, processed in
//! identifier order, and a failure on one asset is reported without
//! stopping the rest.
//!
//! [`BulkCoordinator::execute_strict`] is the stricter variant used by
//! repair tooling: it also checks every asset's transition legality up front
//! and rejects the batch if any asset cannot move.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetFieldUpdate};
use crate::audit::Actor;
use crate::engine::{TransitionEngine, TransitionRequest};
use crate::error::CoreError;
use crate::lifecycle::AssetState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of assets per bulk request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Operation name strings as they appear on the wire.
pub const OP_STATE_TRANSITION: &str = "stateTransition";
pub const OP_BULK_FIELD_UPDATE: &str = "bulkFieldUpdate";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// One bulk operation and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "camelCase")]
pub enum BulkOperation {
    StateTransition {
        #[serde(rename = "newState", alias = "new_state")]
        new_state: AssetState,
    },
    BulkFieldUpdate {
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl BulkOperation {
    /// Build an operation from its wire name and untyped payload.
    ///
    /// A field update may send the field map bare or wrapped as
    /// `{ "fields": { ... } }`.
    pub fn from_parts(operation: &str, payload: serde_json::Value) -> Result<Self, CoreError> {
        let payload = match payload {
            serde_json::Value::Object(map)
                if operation == OP_BULK_FIELD_UPDATE && !map.contains_key("fields") =>
            {
                serde_json::json!({ "fields": map })
            }
            other => other,
        };
        serde_json::from_value(serde_json::json!({
            "operation": operation,
            "payload": payload,
        }))
        .map_err(|e| CoreError::Validation(format!("Invalid bulk operation '{operation}': {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => OP_STATE_TRANSITION,
            Self::BulkFieldUpdate { .. } => OP_BULK_FIELD_UPDATE,
        }
    }
}

/// A batch of asset numbers plus one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub asset_identifiers: Vec<String>,
    pub operation: BulkOperation,
    pub actor: Actor,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Progress of a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkStatus {
    Received,
    Validated,
    Applying,
    Completed,
    PartiallyFailed,
    Rejected,
}

/// Why one asset in an otherwise valid batch was not changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub asset_number: String,
    pub code: &'static str,
    pub message: String,
}

impl BulkFailure {
    fn from_error(asset_number: &str, err: &CoreError) -> Self {
        let message = if err.is_client_safe() {
            err.to_string()
        } else {
            tracing::error!(asset_number, error = %err, "Bulk item failed");
            "An internal error occurred".to_string()
        };
        Self {
            asset_number: asset_number.to_string(),
            code: err.code(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub operation: &'static str,
    pub status: BulkStatus,
    pub affected_count: usize,
    pub updated_assets: Vec<Asset>,
    pub failures: Vec<BulkFailure>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Tracks a single request through its status machine.
struct Run {
    operation: &'static str,
    status: BulkStatus,
}

impl Run {
    fn new(operation: &'static str, size: usize) -> Self {
        tracing::debug!(operation, size, "Bulk request received");
        Self {
            operation,
            status: BulkStatus::Received,
        }
    }

    fn advance(&mut self, next: BulkStatus) {
        tracing::debug!(
            operation = self.operation,
            from = ?self.status,
            to = ?next,
            "Bulk status change",
        );
        self.status = next;
    }

    fn reject(&mut self, err: CoreError) -> CoreError {
        self.advance(BulkStatus::Rejected);
        tracing::info!(operation = self.operation, error = %err, "Bulk request rejected");
        err
    }
}

#[derive(Clone)]
pub struct BulkCoordinator {
    engine: TransitionEngine,
}

impl BulkCoordinator {
    pub fn new(engine: TransitionEngine) -> Self {
        Self { engine }
    }

    /// Apply `request`, skipping and reporting assets whose individual write
    /// fails.
    ///
    /// Identifiers are trimmed and duplicates collapse to their first
    /// occurrence before the size and existence checks, so `affected_count`
    /// counts distinct assets.
    pub async fn execute(&self, request: BulkRequest) -> Result<BulkResult, CoreError> {
        self.run(request, false).await
    }

    /// Apply `request` only if every asset can legally take the requested
    /// transition; otherwise reject the whole batch with
    /// [`CoreError::InvalidTransition`] before writing anything.
    ///
    /// Writes are still per-asset, so a concurrent writer can cause a
    /// reported failure after validation passed.
    pub async fn execute_strict(&self, request: BulkRequest) -> Result<BulkResult, CoreError> {
        self.run(request, true).await
    }

    async fn run(&self, request: BulkRequest, strict: bool) -> Result<BulkResult, CoreError> {
        let identifiers = dedupe(request.asset_identifiers);
        let mut run = Run::new(request.operation.name(), identifiers.len());

        if identifiers.is_empty() {
            return Err(run.reject(CoreError::Validation(
                "At least one asset identifier is required".into(),
            )));
        }
        if identifiers.len() > MAX_BATCH_SIZE {
            return Err(run.reject(CoreError::Validation(format!(
                "Batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                identifiers.len()
            ))));
        }

        let field_update = match &request.operation {
            BulkOperation::BulkFieldUpdate { fields } => match AssetFieldUpdate::from_fields(fields) {
                Ok(update) => Some(update),
                Err(e) => return Err(run.reject(e)),
            },
            BulkOperation::StateTransition { .. } => None,
        };

        let assets = match self.resolve(&identifiers).await {
            Ok(assets) => assets,
            Err(e) => return Err(run.reject(e)),
        };
        if let Err(e) = self.engine.ensure_actor(request.actor).await {
            return Err(run.reject(e));
        }

        if strict {
            if let BulkOperation::StateTransition { new_state } = request.operation {
                let rules = self.engine.rules();
                if let Some(blocked) = assets
                    .iter()
                    .find(|a| !rules.is_legal(a.asset_type, a.state, new_state))
                {
                    return Err(run.reject(CoreError::InvalidTransition {
                        asset_type: blocked.asset_type,
                        from: blocked.state,
                        to: new_state,
                    }));
                }
            }
        }
        run.advance(BulkStatus::Validated);

        run.advance(BulkStatus::Applying);
        let mut updated_assets = Vec::new();
        let mut failures = Vec::new();

        match (&request.operation, field_update) {
            (BulkOperation::StateTransition { new_state }, _) => {
                let transition = TransitionRequest {
                    target: *new_state,
                    actor: request.actor,
                    reason: request.reason.clone(),
                    details: Some(serde_json::json!({ "bulk": true })),
                };
                for number in &identifiers {
                    match self.engine.step_transition(number, &transition).await {
                        Ok(applied) => updated_assets.push(applied.asset),
                        Err(e) => failures.push(BulkFailure::from_error(number, &e)),
                    }
                }
            }
            (BulkOperation::BulkFieldUpdate { .. }, Some(update)) if !update.is_empty() => {
                for number in &identifiers {
                    match self
                        .engine
                        .update_fields(number, &update, request.actor, request.reason.clone())
                        .await
                    {
                        Ok(applied) => updated_assets.push(applied.asset),
                        Err(e) => failures.push(BulkFailure::from_error(number, &e)),
                    }
                }
            }
            // Nothing on the allow-list was supplied.
            (BulkOperation::BulkFieldUpdate { .. }, _) => {}
        }

        run.advance(if failures.is_empty() {
            BulkStatus::Completed
        } else {
            BulkStatus::PartiallyFailed
        });

        tracing::info!(
            operation = run.operation,
            requested = identifiers.len(),
            affected = updated_assets.len(),
            failed = failures.len(),
            "Bulk operation finished",
        );

        Ok(BulkResult {
            operation: run.operation,
            status: run.status,
            affected_count: updated_assets.len(),
            updated_assets,
            failures,
        })
    }

    /// Resolve every identifier to a live asset, in identifier order.
    async fn resolve(&self, identifiers: &[String]) -> Result<Vec<Asset>, CoreError> {
        let found = self.engine.store().find_active_many(identifiers).await?;
        let mut by_number: HashMap<String, Asset> = found
            .into_iter()
            .map(|a| (a.asset_number.clone(), a))
            .collect();

        let missing: Vec<String> = identifiers
            .iter()
            .filter(|n| !by_number.contains_key(*n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::InvalidAssetIdentifiers { missing });
        }

        Ok(identifiers
            .iter()
            .filter_map(|n| by_number.remove(n))
            .collect())
    }
}

/// Drop repeated identifiers, keeping the first occurrence.
fn dedupe(identifiers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
