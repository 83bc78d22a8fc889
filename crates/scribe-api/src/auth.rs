use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};

use scribe_crypto::{PasswordHasher, TokenIssuer};
use scribe_db::Database;
use scribe_types::api::{ErrorResponse, LoginRequest, MessageResponse, RegisterRequest};

use crate::accounts;
use crate::attachments::AttachmentStore;
use crate::config::Config;
use crate::cookie::SessionCookies;
use crate::error::ApiError;
use crate::run_blocking;

pub type AppState = Arc<AppStateInner>;

/// Process-wide state. Built once at startup; read-only afterwards.
pub struct AppStateInner {
    pub db: Database,
    pub hasher: PasswordHasher,
    pub tokens: TokenIssuer,
    pub cookies: SessionCookies,
    pub attachments: AttachmentStore,
    pub token_ttl: chrono::Duration,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            db: Database::open(&config.db_path)?,
            hasher: PasswordHasher::new(config.hash_cost)?,
            tokens: TokenIssuer::new(config.jwt_secret.as_bytes()),
            cookies: SessionCookies::new(config.production),
            attachments: AttachmentStore::new(config.upload_dir.clone()).await?,
            token_ttl: config.token_ttl,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let st = state.clone();
    let user = run_blocking(move || {
        accounts::register(&st.db, &st.hasher, &req.username, &req.password)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /login: verifies credentials and sets the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let st = state.clone();
    let user = run_blocking(move || {
        accounts::verify_credentials(&st.db, &st.hasher, &req.username, &req.password)
    })
    .await?;

    let token = state.tokens.issue(&user, state.token_ttl)?;
    info!("{} ({}) logged in", user.username, user.id);

    Ok((state.cookies.attach(jar, token), Json(user)))
}

/// GET /profile: the verified claims, or `200 {"error": ...}` when there is
/// no valid session. Callers rely on the 200; it is not a 401.
pub async fn profile(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(token) = state.cookies.read(&jar) else {
        return Json(ErrorResponse::new("login required")).into_response();
    };

    match state.tokens.verify(&token) {
        Ok(claims) => Json(claims).into_response(),
        Err(e) => {
            debug!("Profile lookup with unusable session: {}", e);
            Json(ErrorResponse::new("login required")).into_response()
        }
    }
}

/// POST /logout: drops the cookie. The token itself stays valid until it expires.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        state.cookies.clear(jar),
        Json(MessageResponse {
            message: "logged out".into(),
        }),
    )
}
