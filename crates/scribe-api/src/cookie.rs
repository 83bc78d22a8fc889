use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const SESSION_COOKIE: &str = "token";

/// Cookie lifetime. Independent of the token TTL: the token verifier, not
/// the cookie's presence, decides whether a session is valid.
const SESSION_MAX_AGE: time::Duration = time::Duration::days(1);

/// Carries the session token between requests in an HTTP-only cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn build(&self, value: String, max_age: time::Duration) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(max_age)
            .build()
    }

    pub fn attach(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.build(token, SESSION_MAX_AGE))
    }

    /// Overwrite with an empty, zero-lifetime cookie. No server-side
    /// revocation: a copied token stays valid until it expires.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(String::new(), time::Duration::ZERO))
    }

    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}
