use actix_web::web;

use crate::controllers::{advice_controller, auth_controller};
use crate::middleware::rate_limit::RateLimiter;

pub fn routes(cfg: &mut web::ServiceConfig, limiter: RateLimiter) {
    cfg.service(
        web::scope("/api/auth")
            .route("/signup", web::post().to(auth_controller::signup))
            .route(
                "/signup-verify",
                web::post().to(auth_controller::signup_verify),
            )
            .route("/login", web::post().to(auth_controller::login))
            .route("/verify-otp", web::post().to(auth_controller::login_verify)),
    )
    .service(
        web::scope("/api/advice")
            .wrap(limiter)
            .route("/diet", web::post().to(advice_controller::diet_advice)),
    );
}
