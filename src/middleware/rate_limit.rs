//! Sliding-window request throttling for protected endpoints. The caller is
//! authenticated from the bearer token first; the window is then keyed by
//! the verified identity.

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, ResponseError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::future::LocalBoxFuture;

use crate::error::AuthError;
use crate::service::token_service::TokenService;

pub const MAX_REQUESTS: usize = 2;
pub const WINDOW_SECONDS: i64 = 60;

/// Per-identity admission ledger. The single method is an atomic
/// prune-check-record so two concurrent calls for one identity cannot both
/// claim the last slot. An implementation backed by a shared counter store
/// with compare-and-swap semantics can replace the in-memory one.
pub trait RequestWindow: Send + Sync {
    fn try_acquire(&self, identity: &str, now: DateTime<Utc>) -> bool;
}

/// Process-local windows. State does not survive restarts and is not shared
/// across instances; that is a known limitation, not a feature.
#[derive(Default)]
pub struct InMemoryWindows {
    windows: DashMap<String, Vec<DateTime<Utc>>>,
}

impl RequestWindow for InMemoryWindows {
    fn try_acquire(&self, identity: &str, now: DateTime<Utc>) -> bool {
        // The entry guard locks this identity's shard only; other
        // identities proceed in parallel.
        let mut timestamps = self.windows.entry(identity.to_string()).or_default();
        timestamps.retain(|ts| now - *ts < Duration::seconds(WINDOW_SECONDS));
        if timestamps.len() >= MAX_REQUESTS {
            return false;
        }
        timestamps.push(now);
        true
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    tokens: Arc<TokenService>,
    windows: Arc<dyn RequestWindow>,
}

impl RateLimiter {
    pub fn new(tokens: TokenService, windows: Arc<dyn RequestWindow>) -> Self {
        Self {
            tokens: Arc::new(tokens),
            windows,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimiterService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterService {
            service,
            tokens: self.tokens.clone(),
            windows: self.windows.clone(),
        }))
    }
}

pub struct RateLimiterService<S> {
    service: S,
    tokens: Arc<TokenService>,
    windows: Arc<dyn RequestWindow>,
}

impl<S> RateLimiterService<S> {
    fn reject<B>(req: ServiceRequest, err: AuthError) -> ServiceResponse<EitherBody<B>> {
        let response = err.error_response();
        req.into_response(response).map_into_right_body()
    }
}

impl<S, B> Service<ServiceRequest> for RateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = match token {
            Some(t) => t,
            None => {
                return Box::pin(ready(Ok(Self::reject(req, AuthError::Unauthorized))));
            }
        };

        let claims = match self.tokens.verify(&token) {
            Ok(claims) => claims,
            Err(_) => {
                return Box::pin(ready(Ok(Self::reject(req, AuthError::Unauthorized))));
            }
        };

        if !self.windows.try_acquire(&claims.sub, Utc::now()) {
            return Box::pin(ready(Ok(Self::reject(req, AuthError::TooManyRequests))));
        }

        req.extensions_mut().insert(claims);

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
