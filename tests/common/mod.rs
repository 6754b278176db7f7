#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode, header};
use frontdesk::auth::hash_password;
use frontdesk::db::{CreateUserInput, Database, UserKind};
use frontdesk::invite::InviteConfig;
use frontdesk::storage::FileStoreConfig;
use frontdesk::{ServerConfig, create_app};
use tempfile::TempDir;
use tower::ServiceExt;

pub const INVITE_SECRET: &[u8] = b"integration-test-invite-secret-0123456789";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub invites: InviteConfig,
    pub filestore: TempDir,
}

pub async fn setup() -> TestApp {
    setup_with_filestore(FileStoreConfig::default()).await
}

pub async fn setup_suppress_missing() -> TestApp {
    setup_with_filestore(FileStoreConfig {
        suppress_missing: true,
        show_full_path: false,
    })
    .await
}

pub async fn setup_with_filestore(filestore: FileStoreConfig) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let dir = TempDir::new().expect("Failed to create filestore dir");

    let config = ServerConfig {
        db: db.clone(),
        invite_secret: INVITE_SECRET.to_vec(),
        origin: "http://localhost:7291".to_string(),
        web_root: "/web".to_string(),
        secure_cookies: false, // tests run over plain HTTP
        filestore_root: dir.path().to_path_buf(),
        filestore,
    };

    TestApp {
        app: create_app(&config),
        db,
        invites: InviteConfig::new(INVITE_SECRET),
        filestore: dir,
    }
}

impl TestApp {
    /// Drive a request through the router. Requests carry a fake peer address
    /// so the rate limit middleware has an IP to key on.
    pub async fn request(&self, mut req: Request<Body>) -> Response<Body> {
        if req.extensions().get::<ConnectInfo<SocketAddr>>().is_none() {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        }
        self.app
            .clone()
            .oneshot(req)
            .await
            .expect("Request failed")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).expect("Failed to build request"))
            .await
    }

    pub async fn post_json(
        &self,
        path: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.json_request("POST", path, cookie, body).await
    }

    pub async fn put_json(
        &self,
        path: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.json_request("PUT", path, cookie, body).await
    }

    async fn json_request(
        &self,
        method: &str,
        path: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(
            builder
                .body(Body::from(body.to_string()))
                .expect("Failed to build request"),
        )
        .await
    }

    /// POST with an empty body (the browser-facing impersonation routes).
    pub async fn post_empty(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).expect("Failed to build request"))
            .await
    }

    /// Log in and return the session cookie for subsequent requests.
    pub async fn login(&self, login: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/api/auth/login",
                None,
                serde_json::json!({ "login": login, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed");
        session_cookie(&response)
    }
}

/// Extract the session cookie pair from a Set-Cookie header.
pub fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("No Set-Cookie header")
        .to_str()
        .expect("Invalid Set-Cookie header");
    set_cookie
        .split(';')
        .next()
        .expect("Empty Set-Cookie header")
        .to_string()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}

/// Create an admin with a password, returning its user id.
pub async fn create_admin(db: &Database, login: &str, password: &str) -> i64 {
    let hash = hash_password(password).expect("Failed to hash password");
    db.users()
        .create_admin(login, &hash)
        .await
        .expect("Failed to create admin")
}

/// Create a non-admin user with a password, returning its user id.
pub async fn create_user(db: &Database, login: &str, password: &str, kind: UserKind) -> i64 {
    let id = db
        .users()
        .create(CreateUserInput {
            login,
            kind,
            partner_id: None,
        })
        .await
        .expect("Failed to create user");
    let hash = hash_password(password).expect("Failed to hash password");
    db.users()
        .set_password_hash(id, &hash)
        .await
        .expect("Failed to set password");
    id
}
