pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::otp::OtpRecord;
use crate::models::user::Credential;

/// Durable identity -> password-verifier mapping.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<Credential>>;

    /// Creates the credential, failing with `DuplicateIdentity` when the
    /// email is already registered.
    async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential>;
}

/// Short-lived ledger of outstanding one-time codes, one per identity.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<OtpRecord>>;

    /// Stores the record, atomically displacing any prior record for the
    /// same email.
    async fn replace(&self, record: OtpRecord) -> Result<()>;

    /// Deletes and returns the record only if both email and code match, so
    /// concurrent verifications consume a code at most once.
    async fn take(&self, email: &str, code: &str) -> Result<Option<OtpRecord>>;
}
