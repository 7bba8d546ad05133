use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::{relations, tags};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tags", get(list_tags).post(create_tag))
        .route("/api/tags/{id}", get(get_tag).delete(delete_tag))
        .route(
            "/api/tags/{tag_id}/associate/{post_id}",
            post(associate).delete(dissociate),
        )
        .route("/api/tags/{id}/posts", get(list_tag_posts))
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Response> {
    let tags = tags::list(&state.db)?;
    Ok(Json(tags).into_response())
}

async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let tag = tags::get(&state.db, id)?;
    Ok(Json(tag).into_response())
}

#[derive(Deserialize)]
struct CreateTagRequest {
    #[serde(default)]
    name: String,
    user_id: Option<i64>,
}

async fn create_tag(
    State(state): State<AppState>,
    Json(req): Json<CreateTagRequest>,
) -> AppResult<Response> {
    let user_id = req
        .user_id
        .ok_or_else(|| AppError::Validation("Name and user_id are required".into()))?;

    let tag = tags::create(&state.db, user_id, &req.name)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Tag created successfully!",
            "tag_id": tag.id,
        })),
    )
        .into_response())
}

async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    tags::delete(&state.db, id)?;
    Ok(Json(json!({ "message": "Tag deleted successfully" })).into_response())
}

async fn associate(
    State(state): State<AppState>,
    Path((tag_id, post_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    relations::associate_tag(&state.db, tag_id, post_id)?;
    Ok(Json(json!({ "message": "Tag associated with post successfully!" })).into_response())
}

async fn dissociate(
    State(state): State<AppState>,
    Path((tag_id, post_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    relations::dissociate_tag(&state.db, tag_id, post_id)?;
    Ok(Json(json!({ "message": "Tag dissociated from post successfully" })).into_response())
}

async fn list_tag_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let posts = relations::posts_for_tag(&state.db, id)?;
    Ok(Json(posts).into_response())
}
