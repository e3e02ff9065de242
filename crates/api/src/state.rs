use std::sync::Arc;

use custody_core::bulk::BulkCoordinator;
use custody_core::engine::TransitionEngine;
use custody_core::lifecycle::TransitionRules;
use custody_core::store::AssetStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Single-asset lifecycle operations.
    pub engine: TransitionEngine,
    /// Batch operations over the same engine.
    pub bulk: BulkCoordinator,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn AssetStore>, rules: TransitionRules, config: ServerConfig) -> Self {
        let engine = TransitionEngine::new(store, rules);
        Self {
            bulk: BulkCoordinator::new(engine.clone()),
            engine,
            config: Arc::new(config),
        }
    }
}
