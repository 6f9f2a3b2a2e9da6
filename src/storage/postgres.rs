use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error as SqlxError, FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::otp::{OtpPurpose, OtpRecord};
use crate::models::user::Credential;
use crate::storage::{CredentialStore, OtpStore};

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find(&self, email: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
                SELECT id, email, password_hash, created_at
                FROM users
                WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<Credential> {
        let result = sqlx::query_as::<_, Credential>(
            r#"
                INSERT INTO users (id, email, password_hash, created_at)
                VALUES ($1, $2, $3, NOW())
                RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(credential) => Ok(credential),
            Err(SqlxError::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AuthError::DuplicateIdentity)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, FromRow)]
struct OtpRow {
    email: String,
    code: String,
    purpose: String,
    staged_hash: Option<String>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpRecord {
    type Error = AuthError;

    fn try_from(row: OtpRow) -> Result<Self> {
        let purpose = match (row.purpose.as_str(), row.staged_hash) {
            ("signup", Some(staged_hash)) => OtpPurpose::Signup { staged_hash },
            ("login", _) => OtpPurpose::Login,
            (other, _) => {
                return Err(AuthError::Internal(format!(
                    "unknown otp purpose {other:?} for {}",
                    row.email
                )))
            }
        };

        Ok(OtpRecord {
            email: row.email,
            code: row.code,
            expires_at: row.expires_at,
            purpose,
        })
    }
}

#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn find(&self, email: &str) -> Result<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
                SELECT email, code, purpose, staged_hash, expires_at
                FROM otp_codes
                WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpRecord::try_from).transpose()
    }

    async fn replace(&self, record: OtpRecord) -> Result<()> {
        let staged_hash = match &record.purpose {
            OtpPurpose::Signup { staged_hash } => Some(staged_hash.as_str()),
            OtpPurpose::Login => None,
        };

        // Upsert on the email primary key keeps at most one live code per
        // identity without a separate delete round-trip.
        sqlx::query(
            r#"
                INSERT INTO otp_codes (email, code, purpose, staged_hash, expires_at, created_at)
                VALUES ($1, $2, $3, $4, $5, NOW())
                ON CONFLICT (email)
                DO UPDATE SET
                    code = EXCLUDED.code,
                    purpose = EXCLUDED.purpose,
                    staged_hash = EXCLUDED.staged_hash,
                    expires_at = EXCLUDED.expires_at,
                    created_at = NOW()
            "#,
        )
        .bind(&record.email)
        .bind(&record.code)
        .bind(record.purpose.as_str())
        .bind(staged_hash)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take(&self, email: &str, code: &str) -> Result<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
                DELETE FROM otp_codes
                WHERE email = $1 AND code = $2
                RETURNING email, code, purpose, staged_hash, expires_at
            "#,
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpRecord::try_from).transpose()
    }
}
