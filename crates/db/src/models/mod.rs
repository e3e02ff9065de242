//! Row structs for the custody tables.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! a conversion into the corresponding `custody-core` type. Enum columns are
//! stored as TEXT and parsed on the way out.

pub mod asset;
pub mod asset_history;
pub mod user;
