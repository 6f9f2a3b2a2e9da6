use async_trait::async_trait;
use color_eyre::Result as EyreResult;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::error;

use crate::error::{AuthError, Result};

/// Out-of-band delivery of a one-time code. Failures must surface to the
/// caller as `DeliveryFailed`, never be swallowed.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_code(&self, to: &str, code: &str) -> Result<()>;
}

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    pub fn new(
        smtp_host: &str,
        smtp_user: &str,
        smtp_pass: &str,
        from_address: &str,
    ) -> EyreResult<Self> {
        let creds = Credentials::new(smtp_user.to_string(), smtp_pass.to_string());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
            .credentials(creds)
            .build();

        Ok(Self {
            mailer,
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for EmailService {
    async fn send_code(&self, to: &str, code: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from_address.parse().map_err(|e| {
                error!("invalid sender address: {e}");
                AuthError::DeliveryFailed
            })?)
            .to(to.parse().map_err(|e| {
                error!("invalid recipient address: {e}");
                AuthError::DeliveryFailed
            })?)
            .subject("Your OTP Verification Code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your OTP code is: {code}. It will expire in 5 minutes."
            ))
            .map_err(|e| {
                error!("failed to build verification email: {e}");
                AuthError::DeliveryFailed
            })?;

        self.mailer.send(email).await.map_err(|e| {
            error!("failed to send verification email: {e}");
            AuthError::DeliveryFailed
        })?;

        Ok(())
    }
}
