use chrono::{DateTime, Utc};

/// Which flow an outstanding code belongs to. Signup carries the password
/// hash staged until the email is proven; login carries nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup { staged_hash: String },
    Login,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup { .. } => "signup",
            OtpPurpose::Login => "login",
        }
    }
}

/// The single outstanding one-time code for an identity. Issuing a new code
/// replaces any prior record for the same email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub purpose: OtpPurpose,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
