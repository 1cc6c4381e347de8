//! PostgreSQL user directory
//!
//! Stores user records using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;

use crate::directory::{DirectoryError, UserDirectory};
use crate::{NewUser, Role, User, UserId};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// PostgreSQL-backed user directory
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new directory connection
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create the `users` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DirectoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| DirectoryError::Unavailable(format!("corrupt row {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Map a driver error onto the directory taxonomy
fn classify(err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::RowNotFound => DirectoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DirectoryError::ConflictingUnique(db.constraint().unwrap_or("email").to_string())
        }
        other => DirectoryError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        row.try_into()
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(DirectoryError::NotFound)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(DirectoryError::NotFound)?;

        row.try_into()
    }

    async fn find_all(&self) -> Result<Vec<User>, DirectoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn update(&self, user: &User) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = $2, email = $3, role = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(DirectoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), DirectoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = UserRow {
            id: 7,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: "admin".to_string(),
            created_at: now,
            updated_at: now,
        };

        let user = User::try_from(row).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_row_with_unknown_role_is_rejected() {
        let now = Utc::now();
        let row = UserRow {
            id: 7,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: "superuser".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(
            User::try_from(row),
            Err(DirectoryError::Unavailable(_))
        ));
    }

    #[test]
    fn test_classify_row_not_found() {
        assert_eq!(classify(sqlx::Error::RowNotFound), DirectoryError::NotFound);
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut),
            DirectoryError::Unavailable(_)
        ));
    }
}
