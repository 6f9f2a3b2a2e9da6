use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use rand::Rng;
use rand_core::OsRng;
use tracing::instrument;

use crate::error::{AuthError, Result};

#[derive(Debug, Clone)]
pub struct CryptoService;

impl CryptoService {
    fn argon2() -> Result<Argon2<'static>> {
        let params = Params::new(
            32_768, // 32 MB
            3,      // iterations
            1,      // parallelism
            None,
        )
        .map_err(|e| AuthError::Internal(format!("Failed to create Argon2 params: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    #[instrument(skip(self, password))]
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Self::argon2()?;

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))?
            .to_string();

        Ok(hash)
    }

    #[instrument(skip(self, password, hash))]
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {e}")))?;

        let argon2 = Self::argon2()?;

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal(format!(
                "Password verification failed: {e}"
            ))),
        }
    }

    /// Uniform 6-digit code, left-zero-padded.
    pub fn generate_otp_code(&self) -> String {
        let code = rand::thread_rng().gen_range(0..1_000_000u32);
        format!("{code:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let crypto = CryptoService;
        let hash = crypto.hash_password("hunter2hunter2").unwrap();
        assert!(crypto.verify_password("hunter2hunter2", &hash).unwrap());
        assert!(!crypto.verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn otp_codes_are_six_ascii_digits() {
        let crypto = CryptoService;
        for _ in 0..64 {
            let code = crypto.generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
