use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/register — create an account, checking the email
/// explicitly before the insert so the caller gets a precise conflict.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Name, email, and password are required".into(),
        ));
    }

    if users::email_taken(&state.db, &req.email)? {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let verifier = password::hash(&req.password)?;
    let user = users::create(&state.db, &req.name, &req.email, &verifier)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully!",
            "user_id": user.id,
        })),
    )
        .into_response())
}

/// POST /api/auth/login — verify credentials and issue a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let user = users::by_email(&state.db, &req.email)?.ok_or(AppError::Unauthorized)?;
    if !password::verify(&req.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = session::issue_token(&state.db, user.id, state.config.auth.session_hours)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Login successful!",
            "token": token,
            "user_id": user.id,
        })),
    )
        .into_response())
}
