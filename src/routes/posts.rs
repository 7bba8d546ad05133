use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::{posts, relations, views};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            put(update_post).get(get_post).delete(delete_post),
        )
        .route("/api/posts/{id}/upvote", post(upvote_post))
        .route("/api/posts/{id}/downvote", post(downvote_post))
        .route("/api/posts/{id}/tags", get(list_post_tags))
}

/// Listing is enriched: author identity and first photo joined in.
async fn list_posts(State(state): State<AppState>) -> AppResult<Response> {
    let views = views::list_posts_enriched(&state.db)?;
    Ok(Json(views).into_response())
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let post = posts::get(&state.db, id)?;
    Ok(Json(post).into_response())
}

#[derive(Deserialize)]
struct CreatePostRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    user_id: Option<i64>,
}

async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let user_id = req.user_id.ok_or_else(|| {
        AppError::Validation("Title, content, and user_id are required".into())
    })?;

    let post = posts::create(&state.db, user_id, &req.title, &req.content)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully!",
            "post_id": post.id,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Response> {
    posts::update(&state.db, id, req.title.as_deref(), req.content.as_deref())?;
    Ok(Json(json!({ "message": "Post updated successfully!" })).into_response())
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    posts::delete(&state.db, &state.blobs, id)?;
    Ok(Json(json!({ "message": "Post deleted successfully" })).into_response())
}

async fn upvote_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let upvotes = posts::upvote(&state.db, id)?;
    Ok(Json(json!({
        "message": "Post upvoted successfully!",
        "upvotes": upvotes,
    }))
    .into_response())
}

async fn downvote_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let downvotes = posts::downvote(&state.db, id)?;
    Ok(Json(json!({
        "message": "Post downvoted successfully!",
        "downvotes": downvotes,
    }))
    .into_response())
}

async fn list_post_tags(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let tags = relations::tags_for_post(&state.db, id)?;
    Ok(Json(tags).into_response())
}
