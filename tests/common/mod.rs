use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{DateTime, Duration, DurationRound, Utc};
use mockable::DefaultClock;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use spotter::engine::Engine;
use spotter::server::{AppState, create_router};
use spotter::store::{SqliteStore, Store};

/// The router over a fresh database with a bootstrapped admin.
pub struct TestApp {
    pub router: Router,
    pub admin_token: String,
    _temp_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("spotter.db")).expect("open store");
        store.initialize().expect("initialize schema");

        let engine = Arc::new(Engine::new(Arc::new(store), Arc::new(DefaultClock)));
        let admin = engine
            .bootstrap_admin("Admin", "admin@gym.test")
            .expect("bootstrap admin");

        Self {
            router: create_router(Arc::new(AppState::new(engine))),
            admin_token: admin.token,
            _temp_dir: temp_dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    /// Creates a lifter identity and completes its profile. Returns the token.
    pub async fn lifter(&self, name: &str, level: &str) -> String {
        let email = format!("{}@gym.test", name.to_lowercase());
        let resp = self
            .post(
                "/api/v1/admin/users",
                &self.admin_token,
                json!({ "name": name, "email": email }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);
        let token = resp.body["data"]["token"]
            .as_str()
            .expect("token")
            .to_string();

        let resp = self
            .post(
                "/api/v1/me/profile",
                &token,
                json!({ "name": name, "email": email, "experience_level": level }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{:?}", resp.body);
        token
    }

    /// Creates a one-hour slot starting `hours_ahead` hours from the top of the current hour.
    pub async fn slot(&self, hours_ahead: i64, exp: u32, inexp: u32) -> String {
        let start = hour_from_now(hours_ahead);
        let resp = self
            .post(
                "/api/v1/slots",
                &self.admin_token,
                json!({
                    "starts_at_utc": start,
                    "ends_at_utc": start + Duration::hours(1),
                    "capacity_total": exp + inexp,
                    "capacity_exp": exp,
                    "capacity_inexp": inexp,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);
        resp.body["data"]["id"].as_str().expect("slot id").to_string()
    }
}

pub fn hour_from_now(hours: i64) -> DateTime<Utc> {
    let top = Utc::now()
        .duration_trunc(Duration::hours(1))
        .unwrap_or_else(|_| Utc::now());
    top + Duration::hours(hours)
}
