/// Password hashing and verification using Argon2id
///
/// Hashes are PHC strings carrying algorithm, parameters, and a random
/// 16-byte salt, so verification needs nothing but the stored string.
/// The work factor comes from `PasswordConfig` and is checked when the
/// hasher is built.
use accounts_core::PasswordConfig;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Output length in bytes
const OUTPUT_LEN: usize = 32;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// One-way salted password hasher
///
/// Holds no mutable state; clone freely across tasks.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

impl PasswordHasher {
    /// Build a hasher, rejecting an invalid work factor
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(OUTPUT_LEN),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - PHC string format hash, safe to store
    /// * `Err(PasswordError)` - If the primitive cannot complete
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// Uses the parameters embedded in the hash. Returns `false` on mismatch
    /// and on a hash that cannot be parsed; never fails.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = PasswordHasher::new(&light_config()).unwrap();
        let hash = hasher.hash("secret1").expect("Failed to hash password");

        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        // Due to random salt, same password should produce different hashes
        let hasher = PasswordHasher::new(&light_config()).unwrap();

        let hash1 = hasher.hash("SamePassword").unwrap();
        let hash2 = hasher.hash("SamePassword").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("SamePassword", &hash1));
        assert!(hasher.verify("SamePassword", &hash2));
    }

    #[test]
    fn test_hash_does_not_contain_plaintext() {
        let hasher = PasswordHasher::new(&light_config()).unwrap();
        let hash = hasher.hash("plaintext-marker").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("plaintext-marker"));
    }

    #[test]
    fn test_invalid_hash_format_verifies_false() {
        let hasher = PasswordHasher::new(&light_config()).unwrap();
        assert!(!hasher.verify("password", "invalid-hash-format"));
        assert!(!hasher.verify("password", ""));
    }

    #[test]
    fn test_invalid_work_factor_is_rejected() {
        let config = PasswordConfig {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordHasher::new(&config),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_verification_uses_embedded_parameters() {
        let light = PasswordHasher::new(&light_config()).unwrap();
        let heavier = PasswordHasher::new(&PasswordConfig {
            memory_cost: 2048,
            time_cost: 2,
            parallelism: 1,
        })
        .unwrap();

        let hash = light.hash("secret1").unwrap();
        assert!(hash.contains("m=1024"));
        assert!(hash.contains("t=1"));

        // A hasher with different settings still verifies older hashes
        assert!(heavier.verify("secret1", &hash));
    }
}
