use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::password;
use crate::db::models::User;
use crate::db::{relations, users};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).delete(delete_user))
        .route(
            "/api/users/{id}/follow/{target}",
            post(follow).delete(unfollow),
        )
        .route("/api/users/{id}/followers", get(list_followers))
        .route("/api/users/{id}/following", get(list_following))
}

fn user_json(user: &User) -> serde_json::Value {
    json!({ "id": user.id, "name": user.name, "email": user.email })
}

async fn list_users(State(state): State<AppState>) -> AppResult<Response> {
    let users = users::list(&state.db)?;
    let body: Vec<_> = users.iter().map(user_json).collect();
    Ok(Json(body).into_response())
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let user = users::get(&state.db, id)?;
    Ok(Json(user_json(&user)).into_response())
}

#[derive(Deserialize)]
struct CreateUserRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Response> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Name, email, and password are required".into(),
        ));
    }

    let verifier = password::hash(&req.password)?;
    let user = users::create(&state.db, &req.name, &req.email, &verifier)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully!",
            "user_id": user.id,
        })),
    )
        .into_response())
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    users::delete(&state.db, id)?;
    Ok(Json(json!({ "message": "User deleted successfully" })).into_response())
}

async fn follow(
    State(state): State<AppState>,
    Path((id, target)): Path<(i64, i64)>,
) -> AppResult<Response> {
    relations::follow(&state.db, id, target)?;
    Ok(Json(json!({ "message": "User followed successfully!" })).into_response())
}

async fn unfollow(
    State(state): State<AppState>,
    Path((id, target)): Path<(i64, i64)>,
) -> AppResult<Response> {
    relations::unfollow(&state.db, id, target)?;
    Ok(Json(json!({ "message": "User unfollowed successfully" })).into_response())
}

async fn list_followers(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let followers = relations::followers_of(&state.db, id)?;
    let body: Vec<_> = followers.iter().map(user_json).collect();
    Ok(Json(body).into_response())
}

async fn list_following(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let following = relations::followed_by(&state.db, id)?;
    let body: Vec<_> = following.iter().map(user_json).collect();
    Ok(Json(body).into_response())
}
