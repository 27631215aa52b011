use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::AUTHORIZATION},
};
use chrono::Utc;
use serde_json::Value;
use social_service::{
    domain::entities::{AccountId, AnalyticsEvent, ApiCredential},
    infrastructure::{
        analytics::{AnalyticsSink, AnalyticsWorkers},
        config::{AppConfig, RuntimeMode},
        http::{Backends, build_state, create_app},
        persistence::{
            InMemoryAccountStore, InMemoryAnalyticsRepository, InMemoryCredentialStore,
            InMemoryPostStore,
        },
        security::Argon2PasswordHasher,
    },
    presentation::middleware::{
        JwtService, KeyedRateLimiter, RateLimitConfig, SessionOption,
        auth::{API_KEY_HEADER, OWNER_ID_HEADER},
    },
};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

/// The full router over in-memory storage, plus handles to inspect it.
pub struct TestApp {
    pub router: Router,
    pub posts: InMemoryPostStore,
    pub credentials: InMemoryCredentialStore,
    pub accounts: InMemoryAccountStore,
    pub analytics: InMemoryAnalyticsRepository,
    pub tokens: JwtService,
    _workers: AnalyticsWorkers,
}

/// Credentials presented on a request.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    pub bearer: Option<String>,
    pub api_key: Option<String>,
    pub owner: Option<String>,
}

impl Auth {
    pub fn key(credential: &ApiCredential) -> Self {
        Self {
            bearer: None,
            api_key: Some(credential.key.as_str().to_string()),
            owner: Some(credential.owner.to_string()),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::defaults(RuntimeMode::Local))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let posts = InMemoryPostStore::new();
        let credentials = InMemoryCredentialStore::new();
        let accounts = InMemoryAccountStore::new(credentials.clone());
        let analytics = InMemoryAnalyticsRepository::new();
        // Cheapest argon2 costs keep registration fast under test.
        let hasher = Argon2PasswordHasher::new(8, 1, 1).unwrap();

        let (sink, workers) = AnalyticsSink::spawn(Arc::new(analytics.clone()), &config.analytics);
        let backends = Backends {
            posts: Arc::new(posts.clone()),
            credentials: Arc::new(credentials.clone()),
            accounts: Arc::new(accounts.clone()),
            hasher: Arc::new(hasher),
            analytics: sink,
        };
        let limiter = Arc::new(KeyedRateLimiter::new(RateLimitConfig::from(&config.auth)));
        let router = create_app(&config, build_state(&config, backends, limiter));

        Self {
            router,
            posts,
            credentials,
            accounts,
            analytics,
            tokens: JwtService::new(&config.auth.jwt_secret),
            _workers: workers,
        }
    }

    /// Store a freshly issued API key for `owner`.
    pub fn issue_key(&self, owner: i64) -> ApiCredential {
        let credential = ApiCredential::issue(AccountId::new(owner), Utc::now());
        self.credentials.insert(credential.clone());
        credential
    }

    pub fn session_token(&self, owner: i64) -> String {
        self.tokens
            .issue_session_token(AccountId::new(owner), SessionOption::Daily, Utc::now())
            .unwrap()
    }

    /// Key plus a valid session token, as required for post creation.
    pub fn full_auth(&self, owner: i64) -> Auth {
        let credential = self.issue_key(owner);
        Auth::key(&credential).with_bearer(format!("Bearer {}", self.session_token(owner)))
    }

    pub async fn get(&self, path: &str, auth: &Auth) -> TestResponse {
        self.send(Method::GET, path, auth, Body::empty()).await
    }

    pub async fn post_json(&self, path: &str, auth: &Auth, body: &Value) -> TestResponse {
        self.send(Method::POST, path, auth, Body::from(body.to_string())).await
    }

    async fn send(&self, method: Method, path: &str, auth: &Auth, body: Body) -> TestResponse {
        let mut request = Request::builder()
            .uri(path)
            .method(method)
            .header("content-type", "application/json");

        if let Some(bearer) = &auth.bearer {
            request = request.header(AUTHORIZATION, bearer);
        }
        if let Some(key) = &auth.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(owner) = &auth.owner {
            request = request.header(OWNER_ID_HEADER, owner);
        }

        let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        TestResponse::new(response).await
    }

    /// Wait for the analytics workers to have stored at least `count` events.
    pub async fn wait_for_events(&self, count: usize) -> Vec<AnalyticsEvent> {
        for _ in 0..200 {
            let events = self.analytics.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} analytics events, saw {}", self.analytics.events().len());
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl TestResponse {
    async fn new(response: axum::response::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();

        Self { status, headers, body }
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(self.status, expected, "Response body: {}", self.body);
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// The `error.type` field of an error body.
    pub fn error_type(&self) -> String {
        self.json()["error"]["type"].as_str().unwrap_or_default().to_string()
    }
}
