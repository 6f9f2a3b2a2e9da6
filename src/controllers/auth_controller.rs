use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::{AuthError, Result};
use crate::models::user::{LoginRequest, OtpSubmission, SignupRequest};
use crate::service::auth_service::AuthService;

fn validated<T: Validate>(payload: &T) -> Result<()> {
    payload
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))
}

pub async fn signup(
    auth: web::Data<AuthService>,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse> {
    validated(&*request)?;
    auth.signup_request(&request.email, &request.password).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "OTP sent to your email. Please verify to complete signup.",
        "email": request.email,
    })))
}

pub async fn signup_verify(
    auth: web::Data<AuthService>,
    request: web::Json<OtpSubmission>,
) -> Result<HttpResponse> {
    validated(&*request)?;
    auth.signup_verify(&request.email, &request.otp).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Signup successful",
    })))
}

pub async fn login(
    auth: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    validated(&*request)?;
    auth.login_request(&request.email, &request.password).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "OTP sent to your email. Please verify to login.",
    })))
}

pub async fn login_verify(
    auth: web::Data<AuthService>,
    request: web::Json<OtpSubmission>,
) -> Result<HttpResponse> {
    validated(&*request)?;
    let access_token = auth.login_verify(&request.email, &request.otp).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Login successful",
        "access_token": access_token,
    })))
}
