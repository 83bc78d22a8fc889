//! Registration and credential checks.
//!
//! These are blocking (Argon2 + SQLite); handlers run them through
//! `spawn_blocking`. The store never sees plaintext and the hasher never
//! sees the database.

use anyhow::anyhow;
use tracing::info;
use uuid::Uuid;

use scribe_crypto::PasswordHasher;
use scribe_db::Database;
use scribe_types::models::UserPublic;

use crate::error::ApiError;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 8;

pub fn register(
    db: &Database,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<UserPublic, ApiError> {
    if !USERNAME_LEN.contains(&username.chars().count()) || username.trim() != username {
        return Err(ApiError::Validation(
            "username must be 3-32 characters without surrounding spaces".into(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("password must be at least 8 characters".into()));
    }

    let password_hash = hasher.hash(password)?;
    let user_id = Uuid::new_v4();

    if !db.create_user(&user_id.to_string(), username, &password_hash)? {
        return Err(ApiError::Conflict);
    }

    info!("Registered user {} ({})", username, user_id);
    Ok(UserPublic {
        id: user_id,
        username: username.to_string(),
    })
}

pub fn verify_credentials(
    db: &Database,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<UserPublic, ApiError> {
    let user = db.get_user_by_username(username)?.ok_or(ApiError::UserNotFound)?;

    if !hasher.verify(password, &user.password)? {
        return Err(ApiError::InvalidCredential);
    }

    let id = user
        .id
        .parse::<Uuid>()
        .map_err(|e| anyhow!("Corrupt user id '{}': {}", user.id, e))?;

    Ok(UserPublic {
        id,
        username: user.username,
    })
}
