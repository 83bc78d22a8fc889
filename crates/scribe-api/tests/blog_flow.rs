//! End-to-end flows through the API router: registration, login cookie,
//! protected post writes, listing and sanitized detail reads.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use scribe_api::attachments::AttachmentStore;
use scribe_api::auth::{AppState, AppStateInner};
use scribe_api::cookie::SessionCookies;
use scribe_crypto::{HashCost, PasswordHasher, TokenIssuer};
use scribe_db::Database;
use scribe_types::models::UserPublic;

const BOUNDARY: &str = "scribe-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
    _tmp: TempDir,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

impl TestApp {
    async fn new() -> Self {
        Self::with_token_ttl(chrono::Duration::hours(1)).await
    }

    async fn with_token_ttl(token_ttl: chrono::Duration) -> Self {
        let tmp = TempDir::new().unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open(&tmp.path().join("scribe.db")).unwrap(),
            hasher: PasswordHasher::new(HashCost {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
            tokens: TokenIssuer::new(format!("test-secret-{}", Uuid::new_v4()).as_bytes()),
            cookies: SessionCookies::new(false),
            attachments: AttachmentStore::new(tmp.path().join("uploads")).await.unwrap(),
            token_ttl,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        });

        Self {
            router: scribe_api::router::build(state.clone()),
            state,
            _tmp: tmp,
        }
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }

    async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut req = Request::get(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn write_post(
        &self,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let mut req = Request::post("/postWrite").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(multipart_body(fields, file))).unwrap()).await
    }

    /// Register + login; returns the `token=...` cookie pair.
    async fn login_as(&self, username: &str, password: &str) -> String {
        let creds = json!({ "username": username, "password": password });
        self.post_json("/register", creds.clone()).await;
        let res = self.post_json("/login", creds).await;
        assert_eq!(res.status, StatusCode::OK);
        session_cookie(&res.headers).unwrap()
    }

    fn upload_count(&self) -> usize {
        std::fs::read_dir(self.state.attachments.dir()).map(|d| d.count()).unwrap_or(0)
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The `token=<value>` pair from a Set-Cookie header, if any.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn register_login_write_list_detail() {
    let app = TestApp::new().await;
    let creds = json!({ "username": "alice1", "password": "pass1234" });

    let res = app.post_json("/register", creds.clone()).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["username"], "alice1");
    let user_id = res.body["id"].as_str().unwrap().to_string();

    let res = app.post_json("/register", creds.clone()).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert!(res.body["error"].is_string());

    let res = app
        .post_json("/login", json!({ "username": "alice1", "password": "wrong" }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&res.headers).is_none());

    let res = app.post_json("/login", creds).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], user_id.as_str());
    let set_cookie = res.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    let cookie = session_cookie(&res.headers).unwrap();

    let fields = [("title", "Hello"), ("summary", "first"), ("content", "<p>Hi</p>")];
    let res = app.write_post(None, &fields, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body["error"].is_string());

    let res = app.write_post(Some(&cookie), &fields, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["message"].is_string());
    let post_id = res.body["id"].as_str().unwrap().to_string();

    let res = app.get("/postList", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let first = &res.body.as_array().unwrap()[0];
    assert_eq!(first["id"], post_id.as_str());
    assert_eq!(first["title"], "Hello");
    assert_eq!(first["author"], "alice1");
    assert!(first["cover"].is_null());

    let res = app.get(&format!("/postDetail/{post_id}"), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["content"], "<p>Hi</p>");
    assert_eq!(res.body["summary"], "first");
}

#[tokio::test]
async fn login_failures_share_status_and_message() {
    let app = TestApp::new().await;
    app.post_json("/register", json!({ "username": "alice1", "password": "pass1234" }))
        .await;

    let wrong = app
        .post_json("/login", json!({ "username": "alice1", "password": "nope-nope" }))
        .await;
    let missing = app
        .post_json("/login", json!({ "username": "ghost", "password": "pass1234" }))
        .await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, missing.body);
}

#[tokio::test]
async fn malformed_register_body_gets_json_error() {
    let app = TestApp::new().await;
    let req = Request::post("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let res = app.send(req).await;
    assert!(res.status.is_client_error());
    assert!(res.body["error"].is_string());
}

#[tokio::test]
async fn detail_is_sanitized_but_storage_keeps_original() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;
    let raw = r#"<p onclick="steal()">Hi</p><script>alert(1)</script><img src="x" onerror="alert(2)">"#;

    let res = app
        .write_post(Some(&cookie), &[("title", "xss"), ("content", raw)], None)
        .await;
    let post_id = res.body["id"].as_str().unwrap().to_string();

    let detail = app.get(&format!("/postDetail/{post_id}"), None).await;
    let content = detail.body["content"].as_str().unwrap();
    assert!(!content.contains("<script"));
    assert!(!content.contains("onclick"));
    assert!(!content.contains("onerror"));
    assert!(content.contains("<p>Hi</p>"));

    let list = app.get("/postList", None).await;
    assert_eq!(list.body[0]["content"], raw);
}

#[tokio::test]
async fn cover_upload_is_stored_and_referenced() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;

    let res = app
        .write_post(
            Some(&cookie),
            &[("title", "With cover"), ("content", "<p>img</p>")],
            Some(("cover.png", b"\x89PNG\r\n\x1a\n")),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let post_id = res.body["id"].as_str().unwrap();
    let detail = app.get(&format!("/postDetail/{post_id}"), None).await;
    let cover = detail.body["cover"].as_str().unwrap();
    assert!(cover.starts_with("uploads/"));
    assert!(cover.ends_with(".png"));

    let name = cover.strip_prefix("uploads/").unwrap();
    let stored = std::fs::read(app.state.attachments.dir().join(name)).unwrap();
    assert_eq!(stored, b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn empty_file_part_means_no_cover() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;

    let res = app
        .write_post(
            Some(&cookie),
            &[("title", "No cover"), ("content", "<p>x</p>")],
            Some(("", b"")),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn invalid_post_writes_no_attachment() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;

    let res = app
        .write_post(Some(&cookie), &[("title", ""), ("content", "<p>x</p>")], Some(("a.png", b"x")))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.upload_count(), 0);

    let list = app.get("/postList", None).await;
    assert!(list.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn attachment_failure_creates_no_post() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;
    std::fs::remove_dir_all(app.state.attachments.dir()).unwrap();

    let res = app
        .write_post(
            Some(&cookie),
            &[("title", "Doomed"), ("content", "<p>x</p>")],
            Some(("a.png", b"x")),
        )
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.body["error"].is_string());

    let list = app.get("/postList", None).await;
    assert!(list.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;
    let cover = vec![0u8; 2 * MAX_UPLOAD_BYTES];

    let res = app
        .write_post(
            Some(&cookie),
            &[("title", "Too big"), ("content", "<p>x</p>")],
            Some(("huge.png", cover.as_slice())),
        )
        .await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(res.body["error"].is_string());
    assert_eq!(app.upload_count(), 0);

    let list = app.get("/postList", None).await;
    assert!(list.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn login_with_unissuable_ttl_fails_cleanly() {
    let app = TestApp::with_token_ttl(chrono::Duration::seconds(10_000_000_000_000)).await;
    let creds = json!({ "username": "alice1", "password": "pass1234" });
    assert_eq!(app.post_json("/register", creds.clone()).await.status, StatusCode::CREATED);

    let res = app.post_json("/login", creds).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.body["error"].is_string());
    assert!(session_cookie(&res.headers).is_none());
}

#[tokio::test]
async fn list_window_is_six_newest() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;

    for i in 0..10 {
        let title = format!("post {i}");
        let res = app
            .write_post(Some(&cookie), &[("title", &title), ("content", "<p>x</p>")], None)
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }

    let list = app.get("/postList", None).await;
    let titles: Vec<&str> = list
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["post 9", "post 8", "post 7", "post 6", "post 5", "post 4"]);
}

#[tokio::test]
async fn unknown_post_is_404() {
    let app = TestApp::new().await;

    let res = app.get(&format!("/postDetail/{}", Uuid::new_v4()), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.body["error"].is_string());

    let res = app.get("/postDetail/not-an-id", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_reports_claims_or_soft_error() {
    let app = TestApp::new().await;

    let res = app.get("/profile", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["error"].is_string());

    let res = app.get("/profile", Some("token=garbage")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["error"].is_string());

    let cookie = app.login_as("alice1", "pass1234").await;
    let res = app.get("/profile", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["username"], "alice1");
    assert!(res.body["exp"].as_i64().unwrap() > res.body["iat"].as_i64().unwrap());
}

#[tokio::test]
async fn logout_clears_cookie_without_revoking_token() {
    let app = TestApp::new().await;
    let cookie = app.login_as("alice1", "pass1234").await;

    let req = Request::post("/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["message"].is_string());
    let cleared = res.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("token=;"));
    assert!(cleared.contains("Max-Age=0"));

    // A copied token keeps working until it expires.
    let res = app.get("/profile", Some(&cookie)).await;
    assert_eq!(res.body["username"], "alice1");
}

#[tokio::test]
async fn expired_or_foreign_tokens_cannot_write() {
    let app = TestApp::new().await;
    let user = UserPublic {
        id: Uuid::new_v4(),
        username: "alice1".into(),
    };
    let fields = [("title", "Hello"), ("content", "<p>Hi</p>")];

    let stale = app
        .state
        .tokens
        .issue_at(&user, chrono::Duration::seconds(60), chrono::Utc::now() - chrono::Duration::hours(2))
        .unwrap();
    let res = app.write_post(Some(&format!("token={stale}")), &fields, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let foreign = TokenIssuer::new(b"someone-else")
        .issue(&user, chrono::Duration::hours(1))
        .unwrap();
    let res = app.write_post(Some(&format!("token={foreign}")), &fields, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
