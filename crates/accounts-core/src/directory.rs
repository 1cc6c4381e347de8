//! User directory
//!
//! Durable store of user records keyed by id and by email. The
//! `UserDirectory` trait is what account operations call into; this module
//! also provides the process-local `MemoryDirectory` used when no database
//! is configured.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{NewUser, User, UserId};

/// Directory operation failures
///
/// Callers must be able to tell these three apart; anything driver-specific
/// is folded into `Unavailable`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated on {0}")]
    ConflictingUnique(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations required by account management
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Persist a new user; the directory assigns the id
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Look up a user by exact (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError>;

    /// Look up a user by id
    async fn find_by_id(&self, id: UserId) -> Result<User, DirectoryError>;

    /// All users ordered by id
    async fn find_all(&self) -> Result<Vec<User>, DirectoryError>;

    /// Overwrite name, email, and role of an existing user
    async fn update(&self, user: &User) -> Result<User, DirectoryError>;

    /// Remove a user
    async fn delete_by_id(&self, id: UserId) -> Result<(), DirectoryError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: UserId,
    users: BTreeMap<UserId, User>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-memory user directory
///
/// Ids start at 1 and are never reused. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<MemoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(DirectoryError::ConflictingUnique("email".to_string()));
        }

        state.next_id += 1;
        let now = Utc::now();
        let record = User {
            id: state.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_all(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn update(&self, user: &User) -> Result<User, DirectoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Err(DirectoryError::NotFound);
        }
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(DirectoryError::ConflictingUnique("email".to_string()));
        }

        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or(DirectoryError::NotFound)?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.role = user.role;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), DirectoryError> {
        self.state
            .write()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }
}
