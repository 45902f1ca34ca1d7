#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use moviegate::{
    ServerConfig,
    config::AuthConfig,
    create_app,
    db::{Database, UserRole},
    password::hash_password,
    store::{CredentialStore, MemoryStore, StoreError},
};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough!";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-also-long-enough";
pub const PASSWORD: &str = "hunter22";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub store: Arc<MemoryStore>,
}

/// A cookie pair as the client holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn cookie_header(&self) -> String {
        format!(
            "access_token={}; refresh_token={}",
            self.access, self.refresh
        )
    }

    /// Only the refresh cookie, as sent once the access cookie has lapsed.
    pub fn refresh_only(&self) -> String {
        format!("refresh_token={}", self.refresh)
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig::new(JWT_SECRET, REFRESH_SECRET)
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_auth_config()).await
}

pub async fn create_test_app_with(auth: AuthConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    build_test_app(auth, store.clone(), store).await
}

/// Test app whose store calls all pass through a [`CountingStore`].
pub async fn create_counted_test_app() -> (TestApp, Arc<CountingStore>) {
    let store = Arc::new(MemoryStore::new());
    let counting = Arc::new(CountingStore::new(store.clone()));
    let app = build_test_app(test_auth_config(), store, counting.clone()).await;
    (app, counting)
}

async fn build_test_app(
    auth: AuthConfig,
    store: Arc<MemoryStore>,
    shared: Arc<dyn CredentialStore>,
) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        store: shared,
        auth,
        login_per_minute: NonZeroU32::new(1000).unwrap(),
    };
    let app = create_app(&config).expect("Invalid test configuration");
    TestApp { app, db, store }
}

/// Store wrapper that counts every call reaching the backend.
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn counted(&self) -> &MemoryStore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.counted().put(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.counted().get(key).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.counted().take(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.counted().delete(key).await
    }

    async fn add_member(&self, set: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        self.counted().add_member(set, member, ttl).await
    }

    async fn remove_member(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.counted().remove_member(set, member).await
    }

    async fn take_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        self.counted().take_members(set).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.counted().ping().await
    }
}

/// Config with short lifetimes for expiry scenarios.
pub fn short_lived_config(access_secs: u64, refresh_secs: u64) -> AuthConfig {
    AuthConfig {
        access_ttl: Duration::from_secs(access_secs),
        refresh_ttl: Duration::from_secs(refresh_secs),
        ..test_auth_config()
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        cookies: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, session: &Session) -> Response<Body> {
        self.request("GET", uri, Some(&session.cookie_header()), None)
            .await
    }

    /// Insert a user straight into the database.
    pub async fn create_user(&self, username: &str, role: UserRole) -> i64 {
        let hashed = hash_password(PASSWORD).unwrap();
        self.db
            .users()
            .create(username, &hashed, role)
            .await
            .unwrap()
    }

    /// Log in through the API and return the issued cookie pair.
    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed");
        session_from(&response).expect("login did not set both cookies")
    }

    pub async fn user_session(&self, username: &str) -> (i64, Session) {
        let id = self.create_user(username, UserRole::User).await;
        (id, self.login(username).await)
    }

    pub async fn admin_session(&self, username: &str) -> (i64, Session) {
        let id = self.create_user(username, UserRole::Admin).await;
        (id, self.login(username).await)
    }
}

/// All `Set-Cookie` headers as (name, value, raw header).
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<(String, String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.to_string(), value.to_string(), raw.to_string()))
        })
        .collect()
}

/// The pair set by a response, if it set a non-empty value for both cookies.
pub fn session_from(response: &Response<Body>) -> Option<Session> {
    let cookies = extract_set_cookies(response);
    let find = |name: &str| {
        cookies
            .iter()
            .find(|(n, v, _)| n == name && !v.is_empty())
            .map(|(_, v, _)| v.clone())
    };
    Some(Session {
        access: find("access_token")?,
        refresh: find("refresh_token")?,
    })
}

pub fn has_cleared_cookie(response: &Response<Body>, name: &str) -> bool {
    extract_set_cookies(response)
        .iter()
        .any(|(n, v, raw)| n == name && v.is_empty() && raw.contains("Max-Age=0"))
}

pub fn sets_no_cookies(response: &Response<Body>) -> bool {
    response.headers().get(header::SET_COOKIE).is_none()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
