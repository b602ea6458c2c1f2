//! Password hashing with Argon2id.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_complexity: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_complexity: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PasswordPolicyError {
    TooShort { min_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
}

impl std::fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordPolicyError::TooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PasswordPolicyError::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            PasswordPolicyError::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            PasswordPolicyError::MissingDigit => {
                write!(f, "Password must contain at least one digit")
            }
        }
    }
}

impl std::error::Error for PasswordPolicyError {}

impl PasswordPolicy {
    pub fn new(min_length: usize, require_complexity: bool) -> Self {
        Self {
            min_length,
            require_complexity,
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.len() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if self.require_complexity {
            if !password.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(PasswordPolicyError::MissingUppercase);
            }
            if !password.chars().any(|c| c.is_ascii_lowercase()) {
                return Err(PasswordPolicyError::MissingLowercase);
            }
            if !password.chars().any(|c| c.is_ascii_digit()) {
                return Err(PasswordPolicyError::MissingDigit);
            }
        }

        Ok(())
    }
}

/// Hashes a password using Argon2id with configurable memory cost.
///
/// `memory_cost_log2` controls memory usage (KiB = 2^cost): 12 for tests,
/// 16 and up for production.
pub fn hash_password(
    password: &str,
    memory_cost_log2: u32,
) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let m_cost = 1u32 << memory_cost_log2.min(22); // cap at 4GB

    let params =
        Params::new(m_cost, 3, 1, None).map_err(|_| argon2::password_hash::Error::Algorithm)?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

pub fn verify_password(
    password: &str,
    password_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("secure_password_123", 4).expect("Hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secure_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_unique_salts() {
        let hash1 = hash_password("same_password", 4).unwrap();
        let hash2 = hash_password("same_password", 4).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_policy_length() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("password").is_ok());
        assert!(policy.validate("short").is_err());
    }

    #[test]
    fn test_policy_complexity() {
        let policy = PasswordPolicy::new(8, true);
        assert!(policy.validate("password1").is_err()); // no uppercase
        assert!(policy.validate("PASSWORD1").is_err()); // no lowercase
        assert!(policy.validate("Password").is_err()); // no digit
        assert!(policy.validate("Password1").is_ok());
    }

    #[test]
    fn test_policy_error_messages() {
        let policy = PasswordPolicy::new(10, false);
        let err = policy.validate("short").unwrap_err();
        assert!(err.to_string().contains("10 characters"));
    }
}
