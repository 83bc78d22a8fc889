pub mod accounts;
pub mod attachments;
pub mod auth;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod router;
pub mod sanitize;

use tracing::error;

use crate::error::ApiError;

/// Run blocking DB / hashing work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}
