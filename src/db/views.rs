//! Read projections: denormalized views assembled from normalized rows.
//! Pure queries, safe to run alongside writers.

use crate::db::models::PostView;
use crate::error::AppResult;
use crate::state::DbPool;

/// Every post joined with its author's identity and the serving path of
/// its first photo. A dangling author reference degrades to sentinel
/// values instead of failing the listing.
pub fn list_posts_enriched(pool: &DbPool) -> AppResult<Vec<PostView>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.title, p.content, p.upvotes, p.downvotes,
                u.name, u.email,
                (SELECT ph.id FROM photos ph WHERE ph.post_id = p.id
                 ORDER BY ph.id LIMIT 1)
         FROM posts p
         LEFT JOIN users u ON u.id = p.user_id
         ORDER BY p.id",
    )?;

    let views = stmt
        .query_map([], |row| {
            let author_name: Option<String> = row.get(6)?;
            let author_email: Option<String> = row.get(7)?;
            let first_photo_id: Option<i64> = row.get(8)?;
            Ok(PostView {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                upvotes: row.get(4)?,
                downvotes: row.get(5)?,
                author_name: author_name.unwrap_or_else(|| "Unknown".to_string()),
                author_email: author_email.unwrap_or_default(),
                photo_url: first_photo_id.map(photo_file_path),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(views)
}

/// Derived reference path for a photo's bytes; the raw storage locator
/// never leaves the service.
pub fn photo_file_path(photo_id: i64) -> String {
    format!("/api/photos/{}/file", photo_id)
}
