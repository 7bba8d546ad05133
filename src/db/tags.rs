use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Tag;
use crate::db::users;
use crate::error::{unique_conflict, AppError, AppResult};
use crate::state::DbPool;

fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
    })
}

pub fn create(pool: &DbPool, user_id: i64, name: &str) -> AppResult<Tag> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name and user_id are required".into()));
    }

    let conn = pool.get()?;
    if !users::exists(&conn, user_id)? {
        return Err(AppError::NotFound("User"));
    }

    conn.execute(
        "INSERT INTO tags (user_id, name) VALUES (?1, ?2)",
        params![user_id, name],
    )
    .map_err(|e| unique_conflict(e, "tag name already exists"))?;

    let id = conn.last_insert_rowid();
    get(pool, id)
}

pub fn get(pool: &DbPool, id: i64) -> AppResult<Tag> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT id, user_id, name FROM tags WHERE id = ?1",
        params![id],
        row_to_tag,
    )
    .optional()?
    .ok_or(AppError::NotFound("Tag"))
}

pub fn list(pool: &DbPool) -> AppResult<Vec<Tag>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id, user_id, name FROM tags ORDER BY id")?;
    let tags = stmt
        .query_map([], row_to_tag)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Delete a tag and its post associations; the posts themselves stay.
pub fn delete(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: AppResult<()> = (|| {
        if !exists(&conn, id)? {
            return Err(AppError::NotFound("Tag"));
        }
        conn.execute("DELETE FROM post_tags WHERE tag_id = ?1", params![id])?;
        conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])?;
            Ok(())
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

pub(crate) fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM tags WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}
