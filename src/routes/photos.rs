use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::db::{photos, views};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/photos", get(list_photos).post(upload_photo))
        .route("/api/photos/{id}", get(get_photo).delete(delete_photo))
        .route("/api/photos/{id}/file", get(serve_photo_file))
}

fn photo_json(photo: &crate::db::models::Photo) -> serde_json::Value {
    json!({
        "id": photo.id,
        "url": views::photo_file_path(photo.id),
        "post_id": photo.post_id,
        "user_id": photo.user_id,
        "uploaded_at": photo.uploaded_at,
    })
}

async fn list_photos(State(state): State<AppState>) -> AppResult<Response> {
    let photos = photos::list(&state.db)?;
    let body: Vec<_> = photos.iter().map(photo_json).collect();
    Ok(Json(body).into_response())
}

async fn get_photo(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let photo = photos::get(&state.db, id)?;
    Ok(Json(photo_json(&photo)).into_response())
}

/// POST /api/photos — multipart upload: a `photo` file part plus
/// `post_id` and `user_id` fields.
async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut post_id: Option<i64> = None;
    let mut user_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("photo") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid file part: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("post_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid post_id: {}", e)))?;
                post_id = text.trim().parse().ok();
            }
            Some("user_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid user_id: {}", e)))?;
                user_id = text.trim().parse().ok();
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::Validation("No file part in the request".into()))?;
    let (post_id, user_id) = match (post_id, user_id) {
        (Some(p), Some(u)) => (p, u),
        _ => {
            return Err(AppError::Validation(
                "post_id and user_id are required".into(),
            ))
        }
    };

    let photo = photos::create(&state.db, &state.blobs, user_id, post_id, &filename, &bytes)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Photo uploaded successfully!",
            "photo_id": photo.id,
            "photo_url": views::photo_file_path(photo.id),
        })),
    )
        .into_response())
}

async fn delete_photo(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    photos::delete(&state.db, &state.blobs, id)?;
    Ok(Json(json!({ "message": "Photo deleted successfully" })).into_response())
}

/// GET /api/photos/{id}/file — the derived reference path the enriched
/// post listing points at.
async fn serve_photo_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let photo = photos::get(&state.db, id)?;
    let bytes = state.blobs.read(&photo.path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound("Photo")
        } else {
            AppError::Storage(e)
        }
    })?;

    let mime = mime_guess::from_path(&photo.path).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        bytes,
    )
        .into_response())
}
