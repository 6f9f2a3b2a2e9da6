//! In-memory doubles for exercising the flows without Postgres or SMTP.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::otp::OtpRecord;
use crate::models::user::Credential;
use crate::service::email_service::NotificationSink;
use crate::storage::{CredentialStore, OtpStore};

#[derive(Default)]
pub struct MemCredentialStore {
    rows: Mutex<HashMap<String, Credential>>,
}

#[async_trait]
impl CredentialStore for MemCredentialStore {
    async fn find(&self, email: &str) -> Result<Option<Credential>> {
        Ok(self.rows.lock().unwrap().get(email).cloned())
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(email) {
            return Err(AuthError::DuplicateIdentity);
        }
        let credential = Credential {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        rows.insert(email.to_string(), credential.clone());
        Ok(credential)
    }
}

#[derive(Default)]
pub struct MemOtpStore {
    rows: Mutex<HashMap<String, OtpRecord>>,
}

impl MemOtpStore {
    /// Backdates the stored expiry, standing in for the passage of time.
    pub fn expire(&self, email: &str) {
        if let Some(record) = self.rows.lock().unwrap().get_mut(email) {
            record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait]
impl OtpStore for MemOtpStore {
    async fn find(&self, email: &str) -> Result<Option<OtpRecord>> {
        Ok(self.rows.lock().unwrap().get(email).cloned())
    }

    async fn replace(&self, record: OtpRecord) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(record.email.clone(), record);
        Ok(())
    }

    async fn take(&self, email: &str, code: &str) -> Result<Option<OtpRecord>> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(email) {
            Some(record) if record.code == code => Ok(rows.remove(email)),
            _ => Ok(None),
        }
    }
}

/// Records every delivered code instead of sending mail.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_code(&self, to: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}

/// Fails every delivery, for exercising the `DeliveryFailed` path.
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn send_code(&self, _to: &str, _code: &str) -> Result<()> {
        Err(AuthError::DeliveryFailed)
    }
}
