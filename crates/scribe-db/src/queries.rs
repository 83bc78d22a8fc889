use crate::models::{NewPost, PostRow, UserRow};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::{Connection, Row};

const POST_COLUMNS: &str = "id, title, summary, content, cover, author, created_at";

impl Database {
    // -- Users --

    /// Insert a user unless the username is already taken.
    /// Returns `false` on a username conflict; the UNIQUE index decides, so
    /// two concurrent registrations cannot both succeed.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO NOTHING",
                (id, username, password_hash),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Posts --

    /// Insert a post and return the stored row.
    ///
    /// `created_at` is assigned here, under the connection lock, as
    /// `max(now, newest + 1µs)` so it strictly increases across inserts.
    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<PostRow> {
        self.with_conn(|conn| {
            let newest: Option<String> =
                conn.query_row("SELECT MAX(created_at) FROM posts", [], |row| row.get(0))?;

            let mut created = Utc::now().trunc_subsecs(6);
            if let Some(newest) = newest.as_deref().and_then(parse_timestamp) {
                if created <= newest {
                    created = newest + Duration::microseconds(1);
                }
            }
            let created_at = format_timestamp(created);

            conn.execute(
                "INSERT INTO posts (id, title, summary, content, cover, author, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    post.id,
                    post.title,
                    post.summary,
                    post.content,
                    post.cover,
                    post.author,
                    &created_at,
                ],
            )?;

            Ok(PostRow {
                id: post.id.to_string(),
                title: post.title.to_string(),
                summary: post.summary.map(str::to_string),
                content: post.content.to_string(),
                cover: post.cover.map(str::to_string),
                author: post.author.to_string(),
                created_at,
            })
        })
    }

    /// Most recent posts first. Ties on `created_at` fall back to insertion order.
    pub fn list_recent_posts(&self, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1"
            ))?;

            let rows = stmt
                .query_map([limit], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
            let row = stmt.query_row([id], post_from_row).optional()?;
            Ok(row)
        })
    }
}

/// Fixed-width UTC timestamp (microsecond precision) used for `posts.created_at`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parses both the store's RFC 3339 timestamps and SQLite's
/// `datetime('now')` format ("YYYY-MM-DD HH:MM:SS", implicitly UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        content: row.get(3)?,
        cover: row.get(4)?,
        author: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
