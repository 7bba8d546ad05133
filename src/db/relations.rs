//! Association edges: post<->tag and the asymmetric user-follow graph.
//! All queries are eager and return plain ordered rows.

use rusqlite::params;

use crate::db::models::{Post, Tag, User};
use crate::db::{posts, tags, users};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Link a tag to a post. Idempotent: linking an existing pair is a no-op
/// success, guaranteed by the composite primary key.
pub fn associate_tag(pool: &DbPool, tag_id: i64, post_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    if !tags::exists(&conn, tag_id)? {
        return Err(AppError::NotFound("Tag"));
    }
    if !posts::exists(&conn, post_id)? {
        return Err(AppError::NotFound("Post"));
    }

    conn.execute(
        "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
        params![post_id, tag_id],
    )?;
    Ok(())
}

/// Remove a tag-post link; removing an absent link is a no-op success.
pub fn dissociate_tag(pool: &DbPool, tag_id: i64, post_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    if !tags::exists(&conn, tag_id)? {
        return Err(AppError::NotFound("Tag"));
    }
    if !posts::exists(&conn, post_id)? {
        return Err(AppError::NotFound("Post"));
    }

    conn.execute(
        "DELETE FROM post_tags WHERE post_id = ?1 AND tag_id = ?2",
        params![post_id, tag_id],
    )?;
    Ok(())
}

pub fn tags_for_post(pool: &DbPool, post_id: i64) -> AppResult<Vec<Tag>> {
    let conn = pool.get()?;
    if !posts::exists(&conn, post_id)? {
        return Err(AppError::NotFound("Post"));
    }

    let mut stmt = conn.prepare(
        "SELECT t.id, t.user_id, t.name FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?1
         ORDER BY t.id",
    )?;
    let tags = stmt
        .query_map(params![post_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn posts_for_tag(pool: &DbPool, tag_id: i64) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    if !tags::exists(&conn, tag_id)? {
        return Err(AppError::NotFound("Tag"));
    }

    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.title, p.content, p.upvotes, p.downvotes, p.created_at
         FROM posts p
         JOIN post_tags pt ON pt.post_id = p.id
         WHERE pt.tag_id = ?1
         ORDER BY p.id",
    )?;
    let posts = stmt
        .query_map(params![tag_id], |row| {
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                upvotes: row.get(4)?,
                downvotes: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Follower -> followed, asymmetric. Idempotent like associate_tag.
pub fn follow(pool: &DbPool, follower_id: i64, followed_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    if !users::exists(&conn, follower_id)? || !users::exists(&conn, followed_id)? {
        return Err(AppError::NotFound("User"));
    }

    conn.execute(
        "INSERT OR IGNORE INTO followers (follower_id, followed_id) VALUES (?1, ?2)",
        params![follower_id, followed_id],
    )?;
    Ok(())
}

pub fn unfollow(pool: &DbPool, follower_id: i64, followed_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    if !users::exists(&conn, follower_id)? || !users::exists(&conn, followed_id)? {
        return Err(AppError::NotFound("User"));
    }

    conn.execute(
        "DELETE FROM followers WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
    )?;
    Ok(())
}

pub fn followers_of(pool: &DbPool, user_id: i64) -> AppResult<Vec<User>> {
    follow_edge_users(pool, user_id, "f.followed_id = ?1", "f.follower_id")
}

pub fn followed_by(pool: &DbPool, user_id: i64) -> AppResult<Vec<User>> {
    follow_edge_users(pool, user_id, "f.follower_id = ?1", "f.followed_id")
}

fn follow_edge_users(
    pool: &DbPool,
    user_id: i64,
    filter: &str,
    join_on: &str,
) -> AppResult<Vec<User>> {
    let conn = pool.get()?;
    if !users::exists(&conn, user_id)? {
        return Err(AppError::NotFound("User"));
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT u.id, u.name, u.email, u.password_hash, u.created_at
         FROM users u
         JOIN followers f ON {} = u.id
         WHERE {}
         ORDER BY u.id",
        join_on, filter
    ))?;
    let users = stmt
        .query_map(params![user_id], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{posts, tags, test_pool, users};

    fn seed(pool: &DbPool) -> (i64, i64, i64) {
        let user_id = users::create(pool, "alice", "a@x.com", "hash").unwrap().id;
        let post_id = posts::create(pool, user_id, "T", "C").unwrap().id;
        let tag_id = tags::create(pool, user_id, "rust").unwrap().id;
        (user_id, post_id, tag_id)
    }

    #[test]
    fn associate_links_tag_and_post() {
        let (pool, _tmp) = test_pool();
        let (_, post_id, tag_id) = seed(&pool);

        associate_tag(&pool, tag_id, post_id).unwrap();

        let tags = tags_for_post(&pool, post_id).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "rust");

        let posts = posts_for_tag(&pool, tag_id).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, post_id);
    }

    #[test]
    fn associate_is_idempotent() {
        let (pool, _tmp) = test_pool();
        let (_, post_id, tag_id) = seed(&pool);

        associate_tag(&pool, tag_id, post_id).unwrap();
        associate_tag(&pool, tag_id, post_id).unwrap();

        let tags = tags_for_post(&pool, post_id).unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn associate_requires_both_sides() {
        let (pool, _tmp) = test_pool();
        let (_, post_id, tag_id) = seed(&pool);

        assert!(matches!(
            associate_tag(&pool, 42, post_id).unwrap_err(),
            AppError::NotFound("Tag")
        ));
        assert!(matches!(
            associate_tag(&pool, tag_id, 42).unwrap_err(),
            AppError::NotFound("Post")
        ));
    }

    #[test]
    fn dissociate_removes_link_and_tolerates_absence() {
        let (pool, _tmp) = test_pool();
        let (_, post_id, tag_id) = seed(&pool);

        associate_tag(&pool, tag_id, post_id).unwrap();
        dissociate_tag(&pool, tag_id, post_id).unwrap();
        assert!(tags_for_post(&pool, post_id).unwrap().is_empty());

        // Removing again is a no-op success
        dissociate_tag(&pool, tag_id, post_id).unwrap();
    }

    #[test]
    fn follow_is_asymmetric() {
        let (pool, _tmp) = test_pool();
        let alice = users::create(&pool, "alice", "a@x.com", "hash").unwrap().id;
        let bob = users::create(&pool, "bob", "b@x.com", "hash").unwrap().id;

        follow(&pool, alice, bob).unwrap();

        assert_eq!(followed_by(&pool, alice).unwrap().len(), 1);
        assert_eq!(followers_of(&pool, bob).unwrap().len(), 1);
        // A follows B does not imply B follows A
        assert!(followed_by(&pool, bob).unwrap().is_empty());
        assert!(followers_of(&pool, alice).unwrap().is_empty());
    }

    #[test]
    fn follow_is_idempotent_and_unfollow_removes_edge() {
        let (pool, _tmp) = test_pool();
        let alice = users::create(&pool, "alice", "a@x.com", "hash").unwrap().id;
        let bob = users::create(&pool, "bob", "b@x.com", "hash").unwrap().id;

        follow(&pool, alice, bob).unwrap();
        follow(&pool, alice, bob).unwrap();
        assert_eq!(followers_of(&pool, bob).unwrap().len(), 1);

        unfollow(&pool, alice, bob).unwrap();
        assert!(followers_of(&pool, bob).unwrap().is_empty());

        // Unfollowing an absent edge is a no-op success
        unfollow(&pool, alice, bob).unwrap();
    }

    #[test]
    fn follow_requires_existing_users() {
        let (pool, _tmp) = test_pool();
        let alice = users::create(&pool, "alice", "a@x.com", "hash").unwrap().id;
        assert!(matches!(
            follow(&pool, alice, 42).unwrap_err(),
            AppError::NotFound("User")
        ));
    }
}
