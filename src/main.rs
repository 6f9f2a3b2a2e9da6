mod config;
mod controllers;
mod error;
mod middleware;
mod models;
mod service;
mod storage;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::config::Config;
use crate::config::crypto::CryptoService;
use crate::config::routes::routes;
use crate::middleware::rate_limit::{InMemoryWindows, RateLimiter};
use crate::service::advice::{DietAdviceClient, GenAiHttpClient};
use crate::service::auth_service::AuthService;
use crate::service::email_service::EmailService;
use crate::service::field_cipher::FieldCipher;
use crate::service::token_service::TokenService;
use crate::storage::postgres::{PgCredentialStore, PgOtpStore};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().wrap_err("Failed to load config")?;
    let pool = config
        .db_pool()
        .await
        .wrap_err("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .wrap_err("Running migrations")?;

    let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_secs);
    // Built at startup so a bad key fails the boot, not the first request.
    let cipher = FieldCipher::from_base64_key(&config.aes_key)?;
    info!(key_id = cipher.active_key_id(), "field cipher ready");

    let notifier = Arc::new(EmailService::new(
        &config.smtp_host,
        &config.smtp_user,
        &config.smtp_pass,
        &config.email_from,
    )?);
    let auth = AuthService::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(PgOtpStore::new(pool)),
        notifier,
        CryptoService,
        tokens.clone(),
    );
    let advice: Arc<dyn DietAdviceClient> =
        Arc::new(GenAiHttpClient::new(config.advice_api_url.clone()));
    let limiter = RateLimiter::new(tokens, Arc::new(InMemoryWindows::default()));

    let auth = web::Data::new(auth);
    let advice = web::Data::from(advice);
    let cipher = web::Data::new(cipher);

    info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(auth.clone())
            .app_data(advice.clone())
            .app_data(cipher.clone())
            .configure(|cfg| routes(cfg, limiter.clone()))
    })
    .bind(format!("{}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}
