//! Repository for the `users` table.

use custody_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::UserRow;

const COLUMNS: &str = "id, display_name, created_at";

pub struct UserRepo;

impl UserRepo {
    /// Mirror a user id issued by the auth provider.
    pub async fn create(pool: &PgPool, display_name: &str) -> Result<UserRow, sqlx::Error> {
        let query = format!("INSERT INTO users (display_name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(display_name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
