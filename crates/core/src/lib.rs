//! Domain logic for the asset custody service.
//!
//! This crate has no knowledge of HTTP or SQL. Persistence is reached only
//! through the [`store::AssetStore`] trait; [`memory::InMemoryStore`] backs
//! development and tests.

pub mod asset;
pub mod audit;
pub mod bulk;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod types;
