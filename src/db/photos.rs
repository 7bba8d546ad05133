use rusqlite::{params, OptionalExtension};

use crate::db::models::Photo;
use crate::db::{posts, users};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::storage::{allowed_extension, BlobStore};

fn row_to_photo(row: &rusqlite::Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        path: row.get(3)?,
        uploaded_at: row.get(4)?,
    })
}

const PHOTO_COLUMNS: &str = "id, user_id, post_id, path, uploaded_at";

/// Upload a photo: validate the extension, verify the references, write
/// the blob, then insert the row. A failed insert removes the blob again
/// so no row ever points at a blob that was never kept, and vice versa.
pub fn create(
    pool: &DbPool,
    blobs: &BlobStore,
    user_id: i64,
    post_id: i64,
    filename: &str,
    bytes: &[u8],
) -> AppResult<Photo> {
    if filename.is_empty() {
        return Err(AppError::Validation("No file selected".into()));
    }
    if allowed_extension(filename).is_none() {
        return Err(AppError::Validation("Invalid file type".into()));
    }

    {
        let conn = pool.get()?;
        if !posts::exists(&conn, post_id)? {
            return Err(AppError::NotFound("Post"));
        }
        if !users::exists(&conn, user_id)? {
            return Err(AppError::NotFound("User"));
        }
    }

    // Blob first, row second: an orphan blob is recoverable out of band,
    // a row pointing at a missing blob is not.
    let locator = blobs.put(bytes, filename)?;

    let inserted: AppResult<i64> = (|| {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO photos (user_id, post_id, path) VALUES (?1, ?2, ?3)",
            params![user_id, post_id, locator],
        )?;
        Ok(conn.last_insert_rowid())
    })();

    match inserted {
        Ok(id) => get(pool, id),
        Err(e) => {
            if let Err(cleanup) = blobs.delete(&locator) {
                tracing::warn!("Failed to remove orphan blob {}: {}", locator, cleanup);
            }
            Err(e)
        }
    }
}

pub fn get(pool: &DbPool, id: i64) -> AppResult<Photo> {
    let conn = pool.get()?;
    conn.query_row(
        &format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS),
        params![id],
        row_to_photo,
    )
    .optional()?
    .ok_or(AppError::NotFound("Photo"))
}

pub fn list(pool: &DbPool) -> AppResult<Vec<Photo>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM photos ORDER BY id", PHOTO_COLUMNS))?;
    let photos = stmt
        .query_map([], row_to_photo)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(photos)
}

/// Delete the blob before the row; if the blob removal fails the row is
/// left intact so the two never diverge. A blob that is already gone
/// counts as deleted.
pub fn delete(pool: &DbPool, blobs: &BlobStore, id: i64) -> AppResult<()> {
    let photo = get(pool, id)?;

    blobs.delete(&photo.path)?;

    let conn = pool.get()?;
    conn.execute("DELETE FROM photos WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{posts, test_pool, users};

    fn seed(pool: &DbPool) -> (i64, i64) {
        let user_id = users::create(pool, "alice", "a@x.com", "hash").unwrap().id;
        let post_id = posts::create(pool, user_id, "T", "C").unwrap().id;
        (user_id, post_id)
    }

    fn test_store() -> (BlobStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join("uploads")).unwrap();
        (store, tmp)
    }

    #[test]
    fn upload_writes_blob_and_row() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, post_id) = seed(&pool);

        let photo = create(&pool, &store, user_id, post_id, "cat.png", b"pixels").unwrap();
        assert!(store.contains(&photo.path));
        assert_eq!(store.read(&photo.path).unwrap(), b"pixels");
        assert!(!photo.uploaded_at.is_empty());

        let fetched = get(&pool, photo.id).unwrap();
        assert_eq!(fetched.post_id, post_id);
        assert_eq!(fetched.user_id, user_id);
    }

    #[test]
    fn disallowed_extension_rejected_before_any_write() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, post_id) = seed(&pool);

        let err = create(&pool, &store, user_id, post_id, "notes.txt", b"text").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(store.count().unwrap(), 0);
        assert!(list(&pool).unwrap().is_empty());
    }

    #[test]
    fn upload_requires_existing_post() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, _) = seed(&pool);

        let err = create(&pool, &store, user_id, 42, "cat.png", b"pixels").unwrap_err();
        assert!(matches!(err, AppError::NotFound("Post")));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn delete_removes_blob_then_row() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, post_id) = seed(&pool);
        let photo = create(&pool, &store, user_id, post_id, "cat.png", b"pixels").unwrap();

        delete(&pool, &store, photo.id).unwrap();
        assert!(!store.contains(&photo.path));
        assert!(matches!(
            get(&pool, photo.id).unwrap_err(),
            AppError::NotFound("Photo")
        ));
    }

    #[test]
    fn delete_with_missing_blob_still_removes_row() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, post_id) = seed(&pool);
        let photo = create(&pool, &store, user_id, post_id, "cat.png", b"pixels").unwrap();

        store.delete(&photo.path).unwrap();
        delete(&pool, &store, photo.id).unwrap();
        assert!(get(&pool, photo.id).is_err());
    }

    #[test]
    fn failed_blob_delete_leaves_row_intact() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        let (user_id, post_id) = seed(&pool);
        let photo = create(&pool, &store, user_id, post_id, "cat.png", b"pixels").unwrap();

        // Replace the blob with a directory of the same name so the
        // remove_file call fails with something other than NotFound.
        store.delete(&photo.path).unwrap();
        std::fs::create_dir(_blob_tmp.path().join("uploads").join(&photo.path)).unwrap();

        let err = delete(&pool, &store, photo.id).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        // Row survived the failed blob delete
        assert!(get(&pool, photo.id).is_ok());
    }

    #[test]
    fn delete_missing_photo_is_not_found() {
        let (pool, _tmp) = test_pool();
        let (store, _blob_tmp) = test_store();
        assert!(matches!(
            delete(&pool, &store, 42).unwrap_err(),
            AppError::NotFound("Photo")
        ));
    }
}
