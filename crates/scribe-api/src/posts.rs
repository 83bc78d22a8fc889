use axum::{
    Extension, Json,
    extract::{Path, State, multipart::{Multipart, MultipartRejection}},
    response::IntoResponse,
};
use anyhow::anyhow;
use tracing::info;
use uuid::Uuid;

use scribe_db::Database;
use scribe_db::models::{NewPost, PostRow};
use scribe_types::api::{Claims, PostCreatedResponse, PostDraft};
use scribe_types::models::Post;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::sanitize::sanitize;

/// Size of the most-recent window served by `/postList`.
pub const LIST_WINDOW: u32 = 6;

/// An uploaded cover image as received from the multipart form.
struct Upload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

// -- Store operations (blocking) --

/// Trim and check a draft. Title and content are required; an empty summary
/// is treated as absent. Content is otherwise stored exactly as written.
pub fn validate_draft(draft: PostDraft) -> Result<PostDraft, ApiError> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if draft.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".into()));
    }
    let summary = draft
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(PostDraft {
        title,
        summary,
        content: draft.content,
    })
}

/// Insert a post authored by the verified session user.
pub fn create_post(
    db: &Database,
    claims: &Claims,
    draft: PostDraft,
    cover: Option<&str>,
) -> Result<Post, ApiError> {
    let draft = validate_draft(draft)?;
    let id = Uuid::new_v4().to_string();

    let row = db.insert_post(&NewPost {
        id: &id,
        title: &draft.title,
        summary: draft.summary.as_deref(),
        content: &draft.content,
        cover,
        author: &claims.username,
    })?;

    post_from_row(row)
}

pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<Post>, ApiError> {
    let rows = db.list_recent_posts(limit)?;
    rows.into_iter().map(post_from_row).collect()
}

/// Unsanitized lookup. A malformed id is simply not found.
pub fn get_post(db: &Database, post_id: &str) -> Result<Post, ApiError> {
    let id = post_id.parse::<Uuid>().map_err(|_| ApiError::NotFound)?;
    let row = db.get_post(&id.to_string())?.ok_or(ApiError::NotFound)?;
    post_from_row(row)
}

/// A row that fails to parse is a storage fault, not something to paper over.
fn post_from_row(row: PostRow) -> Result<Post, ApiError> {
    let id = row
        .id
        .parse::<Uuid>()
        .map_err(|e| anyhow!("Corrupt post id '{}': {}", row.id, e))?;
    let created_at = scribe_db::parse_timestamp(&row.created_at)
        .ok_or_else(|| anyhow!("Corrupt created_at '{}' on post '{}'", row.created_at, row.id))?;

    Ok(Post {
        id,
        title: row.title,
        summary: row.summary,
        content: row.content,
        cover: row.cover,
        author: row.author,
        created_at,
    })
}

// -- Handlers --

/// POST /postWrite: multipart `title`, `summary`, `content`, optional `files`.
///
/// The cover is written before the post row. If the write fails, no post is
/// created; if the insert fails, the written file is removed again.
pub async fn write_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (draft, upload) = read_form(multipart?).await?;
    let draft = validate_draft(draft)?;

    let cover = match upload {
        Some(upload) => Some(
            state
                .attachments
                .store(&upload.bytes, upload.file_name.as_deref())
                .await
                .map_err(ApiError::Storage)?,
        ),
        None => None,
    };

    let st = state.clone();
    let author = claims.clone();
    let cover_ref = cover.clone();
    let created =
        run_blocking(move || create_post(&st.db, &author, draft, cover_ref.as_deref())).await;

    let post = match created {
        Ok(post) => post,
        Err(e) => {
            if let Some(path) = cover {
                state.attachments.remove(&path).await;
            }
            return Err(e);
        }
    };

    info!("Post {} created by {}", post.id, claims.username);
    Ok(Json(PostCreatedResponse {
        message: "post created".into(),
        id: post.id,
    }))
}

/// GET /postList: newest first, content as stored.
pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let posts = run_blocking(move || list_recent(&st.db, LIST_WINDOW)).await?;
    Ok(Json(posts))
}

/// GET /postDetail/{post_id}: content sanitized for HTML rendering.
pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let mut post = run_blocking(move || get_post(&st.db, &post_id)).await?;
    post.content = sanitize(&post.content);
    Ok(Json(post))
}

async fn read_form(mut multipart: Multipart) -> Result<(PostDraft, Option<Upload>), ApiError> {
    let mut draft = PostDraft::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => draft.title = field.text().await?,
            "summary" => draft.summary = Some(field.text().await?),
            "content" => draft.content = field.text().await?,
            "files" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    upload = Some(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((draft, upload))
}
