use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Post;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::storage::BlobStore;

const MAX_TITLE_LEN: usize = 100;

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        upvotes: row.get(4)?,
        downvotes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const POST_COLUMNS: &str = "id, user_id, title, content, upvotes, downvotes, created_at";

pub fn create(pool: &DbPool, user_id: i64, title: &str, content: &str) -> AppResult<Post> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(AppError::Validation(
            "Title, content, and user_id are required".into(),
        ));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }

    let conn = pool.get()?;
    if !users::exists(&conn, user_id)? {
        return Err(AppError::NotFound("User"));
    }

    conn.execute(
        "INSERT INTO posts (user_id, title, content) VALUES (?1, ?2, ?3)",
        params![user_id, title, content],
    )?;

    let id = conn.last_insert_rowid();
    get(pool, id)
}

pub fn get(pool: &DbPool, id: i64) -> AppResult<Post> {
    let conn = pool.get()?;
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
        params![id],
        row_to_post,
    )
    .optional()?
    .ok_or(AppError::NotFound("Post"))
}

pub fn list(pool: &DbPool) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM posts ORDER BY id", POST_COLUMNS))?;
    let posts = stmt
        .query_map([], row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Partial update: absent fields retain their current value.
pub fn update(
    pool: &DbPool,
    id: i64,
    title: Option<&str>,
    content: Option<&str>,
) -> AppResult<Post> {
    if let Some(title) = title {
        if title.len() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }
    }

    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE posts SET title = COALESCE(?2, title), content = COALESCE(?3, content)
         WHERE id = ?1",
        params![id, title, content],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("Post"));
    }
    get(pool, id)
}

/// Delete a post, cascading to its tag associations and photos. Rows go
/// first in one transaction; blobs are removed after commit (an orphan
/// blob is tolerable, a photo row without a blob is not).
pub fn delete(pool: &DbPool, blobs: &BlobStore, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: AppResult<Vec<String>> = (|| {
        if !exists(&conn, id)? {
            return Err(AppError::NotFound("Post"));
        }

        let mut stmt = conn.prepare("SELECT path FROM photos WHERE post_id = ?1")?;
        let paths: Vec<String> = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        conn.execute("DELETE FROM post_tags WHERE post_id = ?1", params![id])?;
        conn.execute("DELETE FROM photos WHERE post_id = ?1", params![id])?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(paths)
    })();

    match result {
        Ok(paths) => {
            conn.execute("COMMIT", [])?;
            for path in paths {
                if let Err(e) = blobs.delete(&path) {
                    tracing::warn!("Failed to remove blob {}: {}", path, e);
                }
            }
            Ok(())
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

/// Atomic increment; a read-then-write here would lose votes under
/// concurrent callers.
pub fn upvote(pool: &DbPool, id: i64) -> AppResult<i64> {
    vote(pool, id, "upvotes")
}

pub fn downvote(pool: &DbPool, id: i64) -> AppResult<i64> {
    vote(pool, id, "downvotes")
}

fn vote(pool: &DbPool, id: i64, column: &str) -> AppResult<i64> {
    let conn = pool.get()?;
    let changed = conn.execute(
        &format!("UPDATE posts SET {col} = {col} + 1 WHERE id = ?1", col = column),
        params![id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("Post"));
    }

    let count: i64 = conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", column),
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub(crate) fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, users};

    fn seed_user(pool: &DbPool) -> i64 {
        users::create(pool, "alice", "a@x.com", "hash").unwrap().id
    }

    fn test_store() -> (BlobStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join("uploads")).unwrap();
        (store, tmp)
    }

    #[test]
    fn create_assigns_sequential_ids_and_zero_votes() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);

        let post = create(&pool, user_id, "T", "C").unwrap();
        assert_eq!(post.id, 1);
        assert_eq!(post.upvotes, 0);
        assert_eq!(post.downvotes, 0);

        let second = create(&pool, user_id, "T2", "C2").unwrap();
        assert_eq!(second.id, 2);
    }

    #[test]
    fn create_requires_existing_user() {
        let (pool, _tmp) = test_pool();
        let err = create(&pool, 42, "T", "C").unwrap_err();
        assert!(matches!(err, AppError::NotFound("User")));
    }

    #[test]
    fn create_rejects_empty_title_and_content() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);
        assert!(matches!(
            create(&pool, user_id, "", "C").unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            create(&pool, user_id, "T", "  ").unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn create_rejects_overlong_title() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);
        let long = "x".repeat(101);
        assert!(matches!(
            create(&pool, user_id, &long, "C").unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn update_is_partial() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);
        let post = create(&pool, user_id, "T", "C").unwrap();

        let updated = update(&pool, post.id, Some("New title"), None).unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.content, "C");

        let updated = update(&pool, post.id, None, Some("New content")).unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.content, "New content");
    }

    #[test]
    fn update_missing_post_is_not_found() {
        let (pool, _tmp) = test_pool();
        assert!(matches!(
            update(&pool, 42, Some("t"), None).unwrap_err(),
            AppError::NotFound("Post")
        ));
    }

    #[test]
    fn vote_lifecycle() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);
        let post = create(&pool, user_id, "T", "C").unwrap();

        assert_eq!(upvote(&pool, post.id).unwrap(), 1);
        assert_eq!(upvote(&pool, post.id).unwrap(), 2);
        assert_eq!(downvote(&pool, post.id).unwrap(), 1);

        let fetched = get(&pool, post.id).unwrap();
        assert_eq!(fetched.upvotes, 2);
        assert_eq!(fetched.downvotes, 1);
    }

    #[test]
    fn vote_on_missing_post_is_not_found() {
        let (pool, _tmp) = test_pool();
        assert!(matches!(
            upvote(&pool, 42).unwrap_err(),
            AppError::NotFound("Post")
        ));
    }

    #[test]
    fn concurrent_upvotes_lose_no_updates() {
        let (pool, _tmp) = test_pool();
        let user_id = seed_user(&pool);
        let post = create(&pool, user_id, "T", "C").unwrap();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let id = post.id;
                std::thread::spawn(move || upvote(&pool, id).unwrap())
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(get(&pool, post.id).unwrap().upvotes, 8);
    }

    #[test]
    fn delete_cascades_to_associations_and_photos() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let user_id = seed_user(&pool);
        let post = create(&pool, user_id, "T", "C").unwrap();

        let tag = crate::db::tags::create(&pool, user_id, "rust").unwrap();
        crate::db::relations::associate_tag(&pool, tag.id, post.id).unwrap();
        let photo =
            crate::db::photos::create(&pool, &store, user_id, post.id, "pic.png", b"bytes")
                .unwrap();
        assert!(store.contains(&photo.path));

        delete(&pool, &store, post.id).unwrap();

        assert!(matches!(
            get(&pool, post.id).unwrap_err(),
            AppError::NotFound("Post")
        ));
        // The tag itself survives; only the edge and the photos go
        assert!(crate::db::tags::get(&pool, tag.id).is_ok());
        let conn = pool.get().unwrap();
        let edges: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(edges, 0);
        let photos: i64 = conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(photos, 0);
        assert!(!store.contains(&photo.path));
    }

    #[test]
    fn delete_missing_post_is_not_found() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        assert!(matches!(
            delete(&pool, &store, 42).unwrap_err(),
            AppError::NotFound("Post")
        ));
    }
}
