use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use scribe_types::api::Claims;
use scribe_types::models::UserPublic;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed encoding or signature mismatch.
    #[error("invalid session token")]
    Invalid,
    #[error("session token expired")]
    Expired,
}

/// Mints and verifies signed, time-limited session tokens.
///
/// The signing secret is fixed for the life of the issuer. Expiry is checked
/// here rather than by `jsonwebtoken` so the boundary is exact
/// (`now >= exp` is expired, no leeway) and the clock can be injected.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, user: &UserPublic, ttl: Duration) -> anyhow::Result<String> {
        self.issue_at(user, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        user: &UserPublic,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        if ttl <= Duration::zero() {
            anyhow::bail!("session ttl must be positive, got {}s", ttl.num_seconds());
        }
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow::anyhow!("session ttl of {}s overflows the clock", ttl.num_seconds()))?;

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Signature first, then expiry: a forged token is `Invalid` even if stale.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
