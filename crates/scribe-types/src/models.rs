use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only view of a user that ever leaves the server.
/// Password hashes stay inside scribe-db.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
}

/// A published post.
///
/// `author` is the username captured from the session at creation time,
/// not a live reference to the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    /// Relative path of the cover attachment, e.g. `uploads/1700000000000-42.png`.
    pub cover: Option<String>,
    pub author: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
