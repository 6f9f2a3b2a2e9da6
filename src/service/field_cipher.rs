use std::collections::HashMap;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use tracing::warn;

use crate::error::{AuthError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Named encryption keys. Only one key is active today; the id tag is the
/// surface a future rotation scheme hangs versioning on.
pub struct Keyring {
    active_id: String,
    keys: HashMap<String, [u8; KEY_LEN]>,
}

impl Keyring {
    pub fn single(id: &str, key: [u8; KEY_LEN]) -> Self {
        let mut keys = HashMap::new();
        keys.insert(id.to_string(), key);
        Self {
            active_id: id.to_string(),
            keys,
        }
    }

    pub fn from_base64(id: &str, encoded: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| AuthError::Internal(format!("Invalid AES key encoding: {e}")))?;
        let key: [u8; KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            AuthError::Internal(format!(
                "AES key must be {KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::single(id, key))
    }

    pub fn active(&self) -> (&str, &[u8; KEY_LEN]) {
        // The active id always resolves; `single` is the only constructor.
        (&self.active_id, &self.keys[&self.active_id])
    }

    pub fn get(&self, id: &str) -> Option<&[u8; KEY_LEN]> {
        self.keys.get(id)
    }
}

/// Outcome of decrypting a stored field. `Degraded` means the input could
/// not be decrypted and was passed through unchanged, which keeps legacy
/// unencrypted rows readable but can also mask real corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    Decrypted(String),
    Degraded(String),
}

impl DecryptOutcome {
    pub fn into_string(self) -> String {
        match self {
            DecryptOutcome::Decrypted(s) | DecryptOutcome::Degraded(s) => s,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, DecryptOutcome::Degraded(_))
    }
}

/// Encrypts individual sensitive profile fields at rest. Tokens are
/// `base64(iv ++ ciphertext)` with a fresh random IV per call.
pub struct FieldCipher {
    keyring: Keyring,
}

impl FieldCipher {
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        Ok(Self::new(Keyring::from_base64("k1", encoded)?))
    }

    pub fn active_key_id(&self) -> &str {
        self.keyring.active().0
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let (_, key) = self.keyring.active();
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(|e| AuthError::Internal(format!("Invalid cipher parameters: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut raw = Vec::with_capacity(IV_LEN + ciphertext.len());
        raw.extend_from_slice(&iv);
        raw.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(raw))
    }

    /// Never errors: anything that fails to decode or decrypt comes back as
    /// `Degraded` with the input unchanged.
    pub fn decrypt(&self, token: &str) -> DecryptOutcome {
        match self.try_decrypt(token) {
            Ok(plaintext) => DecryptOutcome::Decrypted(plaintext),
            Err(reason) => {
                warn!(%reason, "field decryption degraded to plaintext passthrough");
                DecryptOutcome::Degraded(token.to_string())
            }
        }
    }

    fn try_decrypt(&self, token: &str) -> std::result::Result<String, String> {
        // Stored tokens sometimes arrive with their base64 padding stripped.
        let mut padded = token.to_string();
        let remainder = padded.len() % 4;
        if remainder != 0 {
            padded.push_str(&"=".repeat(4 - remainder));
        }

        let raw = STANDARD
            .decode(padded.as_bytes())
            .map_err(|e| format!("base64 decode: {e}"))?;
        if raw.len() < IV_LEN + BLOCK_LEN {
            return Err("too short to contain an IV and one block".to_string());
        }
        let (iv, ciphertext) = raw.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err("ciphertext is not block-aligned".to_string());
        }

        let (_, key) = self.keyring.active();
        let plaintext = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| format!("cipher parameters: {e}"))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| format!("unpad: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| format!("utf8: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(Keyring::single("k1", [7u8; KEY_LEN]))
    }

    #[test]
    fn round_trips_sensitive_fields() {
        let cipher = cipher();
        for field in ["Amal", "2021-09-14", "female", "peanuts, shellfish", "84.5"] {
            let token = cipher.encrypt(field).unwrap();
            assert_eq!(
                cipher.decrypt(&token),
                DecryptOutcome::Decrypted(field.to_string())
            );
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = cipher();
        let a = cipher.encrypt("allergic to peanuts").unwrap();
        let b = cipher.encrypt("allergic to peanuts").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tolerates_stripped_base64_padding() {
        let cipher = cipher();
        let token = cipher.encrypt("date of birth 2020-01-02").unwrap();
        let stripped = token.trim_end_matches('=');
        assert_eq!(
            cipher.decrypt(stripped),
            DecryptOutcome::Decrypted("date of birth 2020-01-02".to_string())
        );
    }

    #[test]
    fn non_ciphertext_degrades_to_input() {
        let cipher = cipher();
        for legacy in ["already plaintext", "short", "", "!!!not base64!!!"] {
            let outcome = cipher.decrypt(legacy);
            assert!(outcome.is_degraded());
            assert_eq!(outcome.into_string(), legacy);
        }
    }

    #[test]
    fn truncated_ciphertext_degrades_to_input() {
        let cipher = cipher();
        let token = cipher.encrypt("height 92.1").unwrap();
        let mut raw = STANDARD.decode(&token).unwrap();
        raw.pop();
        let truncated = STANDARD.encode(raw);
        let outcome = cipher.decrypt(&truncated);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_string(), truncated);
    }

    #[test]
    fn rejects_misconfigured_keys() {
        assert!(Keyring::from_base64("k1", "not base64 at all").is_err());
        assert!(Keyring::from_base64("k1", &STANDARD.encode([1u8; 16])).is_err());
    }

    #[test]
    fn keyring_exposes_the_active_key_id() {
        let cipher = cipher();
        assert_eq!(cipher.active_key_id(), "k1");
        assert!(cipher.keyring.get("k2").is_none());
    }
}
