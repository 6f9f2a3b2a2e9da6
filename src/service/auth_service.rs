use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::crypto::CryptoService;
use crate::error::{AuthError, Result};
use crate::models::otp::{OtpPurpose, OtpRecord};
use crate::models::user::Credential;
use crate::service::email_service::NotificationSink;
use crate::service::token_service::TokenService;
use crate::storage::{CredentialStore, OtpStore};

pub const OTP_TTL_MINUTES: i64 = 5;

/// Signup and login flows over a shared one-code-per-identity ledger.
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    otps: Arc<dyn OtpStore>,
    notifier: Arc<dyn NotificationSink>,
    crypto: CryptoService,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        otps: Arc<dyn OtpStore>,
        notifier: Arc<dyn NotificationSink>,
        crypto: CryptoService,
        tokens: TokenService,
    ) -> Self {
        Self {
            credentials,
            otps,
            notifier,
            crypto,
            tokens,
        }
    }

    /// Issues a fresh code, displacing any outstanding one for the identity.
    /// The record is durable before delivery is attempted, so a failed send
    /// never leaves an unobservable code.
    async fn issue_otp(&self, email: &str, purpose: OtpPurpose) -> Result<()> {
        let code = self.crypto.generate_otp_code();
        let record = OtpRecord {
            email: email.to_string(),
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            purpose,
        };

        self.otps.replace(record).await?;
        self.notifier.send_code(email, &code).await
    }

    /// Shared verification: no record -> `NotFound`, wrong code ->
    /// `Mismatch`, matching-but-stale -> `Expired` (record retained).
    /// Success consumes the record via conditional delete, so concurrent
    /// submissions of the same code succeed at most once.
    async fn consume_otp(&self, email: &str, submitted: &str) -> Result<OtpPurpose> {
        let record = self.otps.find(email).await?.ok_or(AuthError::NotFound)?;

        if record.code != submitted {
            return Err(AuthError::Mismatch);
        }
        if record.is_expired(Utc::now()) {
            return Err(AuthError::Expired);
        }

        match self.otps.take(email, submitted).await? {
            Some(record) => Ok(record.purpose),
            // Lost the race against a concurrent verify.
            None => Err(AuthError::NotFound),
        }
    }

    /// Starts signup: stages the password hash in the ledger until the email
    /// is proven. Re-running for a pending signup re-issues, it never errors.
    pub async fn signup_request(&self, email: &str, password: &str) -> Result<()> {
        if self.credentials.find(email).await?.is_some() {
            return Err(AuthError::DuplicateIdentity);
        }

        let staged_hash = self.crypto.hash_password(password)?;
        info!("issuing signup verification code");
        self.issue_otp(email, OtpPurpose::Signup { staged_hash }).await
    }

    /// Completes signup, promoting the staged hash into a credential.
    pub async fn signup_verify(&self, email: &str, code: &str) -> Result<Credential> {
        match self.consume_otp(email, code).await? {
            OtpPurpose::Signup { staged_hash } => {
                let credential = self.credentials.insert(email, &staged_hash).await?;
                info!("signup completed");
                Ok(credential)
            }
            OtpPurpose::Login => {
                warn!("login code submitted to signup verification");
                Err(AuthError::NotFound)
            }
        }
    }

    /// Starts login: the password must verify before any code is issued.
    pub async fn login_request(&self, email: &str, password: &str) -> Result<()> {
        let credential = self
            .credentials
            .find(email)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !self
            .crypto
            .verify_password(password, &credential.password_hash)?
        {
            return Err(AuthError::Unauthorized);
        }

        info!("issuing login verification code");
        self.issue_otp(email, OtpPurpose::Login).await
    }

    /// Completes login, minting a session token bound to the identity.
    pub async fn login_verify(&self, email: &str, code: &str) -> Result<String> {
        match self.consume_otp(email, code).await? {
            OtpPurpose::Login => self.tokens.issue(email),
            OtpPurpose::Signup { .. } => {
                warn!("signup code submitted to login verification");
                Err(AuthError::NotFound)
            }
        }
    }
}
