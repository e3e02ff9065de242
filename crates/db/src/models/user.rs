use custody_core::audit::ActorProfile;
use custody_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub display_name: String,
    pub created_at: Timestamp,
}

impl From<UserRow> for ActorProfile {
    fn from(row: UserRow) -> Self {
        ActorProfile {
            id: row.id,
            display_name: row.display_name,
        }
    }
}
