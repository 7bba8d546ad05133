use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;
use crate::error::{unique_conflict, AppError, AppResult};
use crate::state::DbPool;

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

pub fn create(pool: &DbPool, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(AppError::Validation(
            "Name, email, and password are required".into(),
        ));
    }

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (name, email, password_hash) VALUES (?1, ?2, ?3)",
        params![name, email, password_hash],
    )
    .map_err(|e| unique_conflict(e, "name or email already in use"))?;

    let id = conn.last_insert_rowid();
    get(pool, id)
}

pub fn get(pool: &DbPool, id: i64) -> AppResult<User> {
    let conn = pool.get()?;
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        row_to_user,
    )
    .optional()?
    .ok_or(AppError::NotFound("User"))
}

pub fn by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn list(pool: &DbPool) -> AppResult<Vec<User>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn email_taken(pool: &DbPool, email: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Delete a user. Blocked while the user still owns posts, tags, or
/// photos; follow edges and sessions go with the user.
pub fn delete(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: AppResult<()> = (|| {
        if !exists(&conn, id)? {
            return Err(AppError::NotFound("User"));
        }

        let owned: i64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM posts WHERE user_id = ?1)
                  + (SELECT COUNT(*) FROM tags WHERE user_id = ?1)
                  + (SELECT COUNT(*) FROM photos WHERE user_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if owned > 0 {
            return Err(AppError::Conflict(
                "user still owns posts, tags, or photos".into(),
            ));
        }

        conn.execute(
            "DELETE FROM followers WHERE follower_id = ?1 OR followed_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
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
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}
