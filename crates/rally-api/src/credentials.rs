use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Password hashing and verification with Argon2id.
pub struct Credentials {
    argon2: Argon2<'static>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Credentials {
    /// Custom cost parameters. Memory is in KiB.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// Errors only when the stored hash itself is unreadable.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| anyhow!("Stored password hash is corrupt: {}", e))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// A fresh bearer token: 16 random bytes, hex encoded.
pub fn issue_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Credentials {
        Credentials::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let creds = fast();
        let hash = creds.hash("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(creds.verify("hunter22", &hash).unwrap());
        assert!(!creds.verify("hunter23", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(fast().verify("anything", "not a phc string").is_err());
    }

    #[test]
    fn tokens_are_distinct_hex() {
        let a = issue_token();
        let b = issue_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
