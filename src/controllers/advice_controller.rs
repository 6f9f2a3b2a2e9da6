use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AuthError, Result};
use crate::service::advice::DietAdviceClient;
use crate::service::token_service::Claims;

#[derive(Debug, Deserialize, Validate)]
pub struct AdviceRequest {
    #[validate(length(min = 1))]
    pub question: String,
}

/// Sits behind the rate limiter, which authenticates the caller and stashes
/// the verified claims in request extensions.
pub async fn diet_advice(
    req: HttpRequest,
    advice: web::Data<dyn DietAdviceClient>,
    payload: web::Json<AdviceRequest>,
) -> Result<HttpResponse> {
    payload
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(AuthError::Unauthorized)?;

    let answer = advice.advise(&payload.question).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "email": claims.sub,
        "advice": answer,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::middleware::rate_limit::{InMemoryWindows, RateLimiter};
    use crate::service::token_service::TokenService;

    struct CannedAdvice;

    #[async_trait]
    impl DietAdviceClient for CannedAdvice {
        async fn advise(&self, question: &str) -> Result<String> {
            Ok(format!("For \"{question}\": more leafy greens."))
        }
    }

    fn advice_data() -> web::Data<dyn DietAdviceClient> {
        let client: Arc<dyn DietAdviceClient> = Arc::new(CannedAdvice);
        web::Data::from(client)
    }

    #[actix_web::test]
    async fn authenticated_caller_gets_advice() {
        let tokens = TokenService::new("test-secret", 3600);
        let token = tokens.issue("a@x.com").unwrap();
        let limiter = RateLimiter::new(tokens, Arc::new(InMemoryWindows::default()));

        let app = test::init_service(
            App::new().app_data(advice_data()).service(
                web::scope("/api/advice")
                    .wrap(limiter)
                    .route("/diet", web::post().to(diet_advice)),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/advice/diet")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(serde_json::json!({"question": "is mango ok for a toddler?"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["email"], "a@x.com");
        assert!(body["advice"].as_str().unwrap().contains("leafy greens"));
    }

    #[actix_web::test]
    async fn unauthenticated_caller_is_401() {
        let tokens = TokenService::new("test-secret", 3600);
        let limiter = RateLimiter::new(tokens, Arc::new(InMemoryWindows::default()));

        let app = test::init_service(
            App::new().app_data(advice_data()).service(
                web::scope("/api/advice")
                    .wrap(limiter)
                    .route("/diet", web::post().to(diet_advice)),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/advice/diet")
            .set_json(serde_json::json!({"question": "is mango ok for a toddler?"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }
}
