use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // email
    pub iat: usize,
    pub exp: usize,
}

/// Stateless HS256 session tokens. Validity is purely signature + embedded
/// claims; there is no revocation list.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: ttl_secs as i64,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now as usize,
            exp: (now + self.ttl_secs) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let tokens = TokenService::new("test-secret", 3600);
        let token = tokens.issue("parent@example.com").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "parent@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = TokenService::new("test-secret", 3600);
        let token = tokens.issue("parent@example.com").unwrap();
        let mut forged = token.clone();
        forged.pop();
        forged.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(matches!(
            tokens.verify(&forged),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let ours = TokenService::new("test-secret", 3600);
        let theirs = TokenService::new("other-secret", 3600);
        let token = theirs.issue("parent@example.com").unwrap();
        assert!(matches!(ours.verify(&token), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("test-secret", 3600);
        let past = Utc::now().timestamp() - 7200;
        let claims = Claims {
            sub: "parent@example.com".to_string(),
            iat: past as usize,
            exp: (past + 60) as usize,
        };
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(tokens.verify(&stale), Err(AuthError::Unauthorized)));
    }
}
