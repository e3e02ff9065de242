//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Reads accept `&PgPool`; writes that must share a transaction accept
//! `&mut PgConnection` so callers can pass `&mut *tx`.

pub mod asset_history_repo;
pub mod asset_repo;
pub mod user_repo;

pub use asset_history_repo::AssetHistoryRepo;
pub use asset_repo::AssetRepo;
pub use user_repo::UserRepo;
