//! Account service layer
//!
//! Business logic for registration, login, profile reads and updates,
//! deletion, and role changes. Every directory call is bounded by the
//! storage timeout; hashing runs on the blocking pool.

use super::jwt::TokenService;
use super::models::{
    validate_fields, LoginRequest, LoginResponse, RegisterRequest, UpdateUserRequest,
};
use super::password::{PasswordError, PasswordHasher};
use crate::audit::{audit_log, AuditEvent};
use accounts_core::{
    normalize_email, AccountError, DirectoryError, NewUser, Result, Role, User, UserDirectory,
    UserId, UserPublic,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REGISTER_FIELDS: &[&str] = &["name", "email", "password"];
const LOGIN_FIELDS: &[&str] = &["email", "password"];
const UPDATE_FIELDS: &[&str] = &["name", "email"];

/// Plaintext hashed once at startup to equalize login timing for unknown emails
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

/// Account service
pub struct AccountService {
    directory: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    storage_timeout: Duration,
    dummy_hash: String,
    #[cfg(test)]
    verifications: std::sync::atomic::AtomicUsize,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .field("storage_timeout", &self.storage_timeout)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    /// Create a new account service
    ///
    /// Computes the dummy hash used by `login`, so this costs one Argon2 run.
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        storage_timeout: Duration,
    ) -> std::result::Result<Self, PasswordError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(Self {
            directory,
            hasher,
            tokens,
            storage_timeout,
            dummy_hash,
            #[cfg(test)]
            verifications: Default::default(),
        })
    }

    /// Register a new user with the default role
    pub async fn register(&self, mut request: RegisterRequest) -> Result<UserPublic> {
        request.email = normalize_email(&request.email);

        if let Err(err) = validate_fields(&request, REGISTER_FIELDS) {
            audit_log(&AuditEvent::RegistrationFailure {
                email: request.email.clone(),
                reason: "validation".to_string(),
            });
            return Err(err);
        }

        match self
            .bounded("find_by_email", self.directory.find_by_email(&request.email))
            .await
        {
            Ok(_) => return Err(self.duplicate_registration(&request.email)),
            Err(DirectoryError::NotFound) => {}
            Err(e) => return Err(storage_error("find_by_email", e)),
        }

        let password_hash = self.hash_password(request.password).await?;
        let new_user = NewUser::new(request.name, request.email.clone(), password_hash);

        // A concurrent registration can still win the unique constraint
        let user = match self
            .bounded("insert", self.directory.insert(new_user))
            .await
        {
            Ok(user) => user,
            Err(DirectoryError::ConflictingUnique(_)) => {
                return Err(self.duplicate_registration(&request.email))
            }
            Err(e) => return Err(storage_error("insert", e)),
        };

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        });
        info!(user_id = user.id, "User registered");

        Ok(user.to_public())
    }

    fn duplicate_registration(&self, email: &str) -> AccountError {
        audit_log(&AuditEvent::RegistrationFailure {
            email: email.to_string(),
            reason: "duplicate_email".to_string(),
        });
        AccountError::DuplicateEmail
    }

    /// Verify credentials and issue a session token
    ///
    /// Unknown email and wrong password produce the same error, and both
    /// paths perform exactly one hash verification.
    pub async fn login(&self, mut request: LoginRequest) -> Result<LoginResponse> {
        request.email = normalize_email(&request.email);
        validate_fields(&request, LOGIN_FIELDS)?;
        let email = request.email;

        let user = match self
            .bounded("find_by_email", self.directory.find_by_email(&email))
            .await
        {
            Ok(user) => Some(user),
            Err(DirectoryError::NotFound) => None,
            Err(e) => return Err(storage_error("find_by_email", e)),
        };

        let Some(user) = user else {
            self.verify_password(request.password, self.dummy_hash.clone())
                .await?;
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: "unknown_email".to_string(),
            });
            return Err(AccountError::InvalidCredentials);
        };

        if !self
            .verify_password(request.password, user.password_hash.clone())
            .await?
        {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: "wrong_password".to_string(),
            });
            return Err(AccountError::InvalidCredentials);
        }

        let issued = self.tokens.issue(user.id, user.role).map_err(|e| {
            error!(user_id = user.id, error = %e, "Failed to issue token");
            AccountError::Signing
        })?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
        });

        Ok(LoginResponse {
            token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            user: user.to_public(),
        })
    }

    /// All users ordered by id
    pub async fn get_all(&self) -> Result<Vec<UserPublic>> {
        let users = self
            .bounded("find_all", self.directory.find_all())
            .await
            .map_err(|e| storage_error("find_all", e))?;

        Ok(users.iter().map(User::to_public).collect())
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<UserPublic> {
        self.find_user(id).await.map(|user| user.to_public())
    }

    /// Overwrite the requester's own name and email
    pub async fn update(
        &self,
        requester: UserId,
        target: UserId,
        mut request: UpdateUserRequest,
    ) -> Result<UserPublic> {
        ensure_owner(requester, target, "update")?;

        request.email = normalize_email(&request.email);
        validate_fields(&request, UPDATE_FIELDS)?;

        let mut user = self.find_user(target).await?;

        if user.email != request.email {
            match self
                .bounded("find_by_email", self.directory.find_by_email(&request.email))
                .await
            {
                Ok(other) if other.id != target => return Err(AccountError::DuplicateEmail),
                Ok(_) | Err(DirectoryError::NotFound) => {}
                Err(e) => return Err(storage_error("find_by_email", e)),
            }
        }

        user.name = request.name;
        user.email = request.email;

        let updated = self.save(&user).await?;
        info!(user_id = updated.id, "User profile updated");
        Ok(updated.to_public())
    }

    /// Remove the requester's own account
    pub async fn delete(&self, requester: UserId, target: UserId) -> Result<()> {
        ensure_owner(requester, target, "delete")?;

        self.bounded("delete_by_id", self.directory.delete_by_id(target))
            .await
            .map_err(|e| storage_error("delete_by_id", e))?;

        audit_log(&AuditEvent::AccountDeleted { user_id: target });
        Ok(())
    }

    /// Set a user's role; the caller's admin role is checked by the route layer
    pub async fn update_role(&self, target: UserId, role: Role) -> Result<UserPublic> {
        let mut user = self.find_user(target).await?;
        user.role = role;

        let updated = self.save(&user).await?;
        info!(user_id = updated.id, role = %updated.role, "User role updated");
        Ok(updated.to_public())
    }

    async fn find_user(&self, id: UserId) -> Result<User> {
        self.bounded("find_by_id", self.directory.find_by_id(id))
            .await
            .map_err(|e| storage_error("find_by_id", e))
    }

    async fn save(&self, user: &User) -> Result<User> {
        self.bounded("update", self.directory.update(user))
            .await
            .map_err(|e| storage_error("update", e))
    }

    /// Run a directory call under the storage timeout
    async fn bounded<T, F>(
        &self,
        operation: &str,
        call: F,
    ) -> std::result::Result<T, DirectoryError>
    where
        F: Future<Output = std::result::Result<T, DirectoryError>>,
    {
        match tokio::time::timeout(self.storage_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Unavailable(format!(
                "{operation} timed out after {}ms",
                self.storage_timeout.as_millis()
            ))),
        }
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "Hashing task failed");
                AccountError::Hashing
            })?
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                AccountError::Hashing
            })
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                error!(error = %e, "Verification task failed");
                AccountError::Hashing
            })
    }
}

fn ensure_owner(requester: UserId, target: UserId, action: &str) -> Result<()> {
    if requester == target {
        return Ok(());
    }

    audit_log(&AuditEvent::AccessDenied {
        user_id: Some(requester),
        resource: format!("users/{target}:{action}"),
        required_role: None,
        ip_address: None,
    });
    Err(AccountError::Forbidden(format!(
        "cannot {action} another user's account"
    )))
}

/// Classify a directory failure; driver details stay in the log
///
/// `NotFound` always refers to the user record here; callers for which a
/// missing record is not an error match on it first.
fn storage_error(operation: &str, err: DirectoryError) -> AccountError {
    match err {
        DirectoryError::NotFound => AccountError::NotFound("User".to_string()),
        DirectoryError::ConflictingUnique(_) => AccountError::DuplicateEmail,
        DirectoryError::Unavailable(detail) => {
            warn!(operation, error = %detail, "Storage unavailable");
            AccountError::StorageUnavailable
        }
    }
}
