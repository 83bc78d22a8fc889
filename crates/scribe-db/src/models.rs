/// Row types that map directly to SQLite rows.
/// Distinct from scribe-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub cover: Option<String>,
    pub author: String,
    pub created_at: String,
}

/// Everything a post insert needs except the timestamp, which the store assigns.
pub struct NewPost<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub summary: Option<&'a str>,
    pub content: &'a str,
    pub cover: Option<&'a str>,
    pub author: &'a str,
}
