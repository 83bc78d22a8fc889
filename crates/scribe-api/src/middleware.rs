use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::AppState;
use crate::error::ApiError;

/// Verify the session cookie and expose its claims to the handler as an
/// `Extension<Claims>`. Verified claims are the only identity a protected
/// handler ever sees.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = state.cookies.read(&jar).ok_or(ApiError::Unauthenticated)?;
    let claims = state.tokens.verify(&token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
