use anyhow::Context;
use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{Method, StatusCode, header},
    middleware::from_fn,
    response::Json,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    application::{
        ContentPipeline,
        use_cases::{
            CreatePostUseCase, GetPostMediaUseCase, ListPostsUseCase, LoginUseCase,
            RegisterAccountUseCase,
        },
    },
    domain::repositories::{AccountStore, AnalyticsRepository, CredentialStore, PostStore},
    infrastructure::{
        analytics::AnalyticsSink,
        config::{AppConfig, RuntimeMode},
        persistence::{
            Database, InMemoryAccountStore, InMemoryAnalyticsRepository, InMemoryCredentialStore,
            InMemoryPostStore, PostgresAccountStore, PostgresAnalyticsRepository,
            PostgresCredentialStore, PostgresPostStore,
        },
        security::{Argon2PasswordHasher, PasswordHashing},
    },
    presentation::{
        handlers::AppState,
        middleware::{
            AuthGate, JwtService, KeyValidator, KeyedRateLimiter, RateLimitConfig,
            auth::{API_KEY_HEADER, OWNER_ID_HEADER},
            error::global_error_handler,
        },
        routes,
    },
};

/// Storage the request path runs against
#[derive(Clone)]
pub struct Backends {
    pub posts: Arc<dyn PostStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub hasher: Arc<dyn PasswordHashing>,
    pub analytics: AnalyticsSink,
}

/// Wire use cases and the authentication gate over `backends`.
pub fn build_state(
    config: &AppConfig,
    backends: Backends,
    limiter: Arc<KeyedRateLimiter>,
) -> AppState {
    let pipeline = ContentPipeline::new(Arc::clone(&backends.posts), config.pipeline.write_timeout());
    let keys = KeyValidator::new(backends.credentials, config.auth.key_lookup_timeout());
    let tokens = Arc::new(JwtService::new(&config.auth.jwt_secret));

    let register_account = RegisterAccountUseCase::new(
        Arc::clone(&backends.accounts),
        Arc::clone(&backends.hasher),
        backends.analytics.clone(),
        config.auth.min_password_length,
    );
    let login =
        LoginUseCase::new(backends.accounts, backends.hasher, backends.analytics.clone());

    AppState {
        create_post: Arc::new(CreatePostUseCase::new(pipeline, backends.analytics)),
        list_posts: Arc::new(ListPostsUseCase::new(Arc::clone(&backends.posts))),
        post_media: Arc::new(GetPostMediaUseCase::new(Arc::clone(&backends.posts))),
        register_account: Arc::new(register_account),
        login: Arc::new(login),
        tokens: Arc::clone(&tokens),
        auth_gate: AuthGate::new(tokens, keys, limiter),
        posts: backends.posts,
    }
}

/// Create the main application router
pub fn create_app(config: &AppConfig, state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(create_cors_layer())
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes));

    routes::create_routes(state)
        .layer(from_fn(global_error_handler))
        .layer(middleware_stack)
        .fallback(not_found_handler)
}

/// Liveness check
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "social-service"
    }))
}

/// Readiness check; fails while the post store cannot be reached
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.posts.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "checks": { "database": "ok" }
            })),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "checks": { "database": "unavailable" }
                })),
            )
        }
    }
}

async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested resource was not found"
        })),
    )
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(API_KEY_HEADER),
            header::HeaderName::from_static(OWNER_ID_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Store handles opened over [`Storage`]
struct Repositories {
    posts: Arc<dyn PostStore>,
    credentials: Arc<dyn CredentialStore>,
    accounts: Arc<dyn AccountStore>,
    analytics: Arc<dyn AnalyticsRepository>,
}

/// Connection pools held for the life of the server.
enum Storage {
    Postgres { primary: Database, analytics: Database },
    InMemory,
}

impl Storage {
    async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let primary = match Database::new(&config.database).await {
            Ok(db) => db,
            Err(e) if config.mode == RuntimeMode::Local => {
                warn!(error = %e, "Failed to connect to database");
                warn!("Starting with in-memory storage; data will not survive a restart");
                return Ok(Self::InMemory);
            }
            Err(e) => return Err(e.context("failed to connect to the primary database")),
        };

        if config.database.run_migrations {
            primary.migrate().await.context("failed to apply migrations")?;
        }

        let analytics =
            Database::dedicated(&config.database, "analytics", config.analytics.max_connections)
                .await
                .context("failed to open the analytics pool")?;

        Ok(Self::Postgres { primary, analytics })
    }

    fn repositories(&self) -> Repositories {
        match self {
            Self::Postgres { primary, analytics } => Repositories {
                posts: Arc::new(PostgresPostStore::new(primary.pool().clone())),
                credentials: Arc::new(PostgresCredentialStore::new(primary.pool().clone())),
                accounts: Arc::new(PostgresAccountStore::new(primary.pool().clone())),
                analytics: Arc::new(PostgresAnalyticsRepository::new(analytics.pool().clone())),
            },
            Self::InMemory => {
                let credentials = InMemoryCredentialStore::new();
                Repositories {
                    posts: Arc::new(InMemoryPostStore::new()),
                    accounts: Arc::new(InMemoryAccountStore::new(credentials.clone())),
                    credentials: Arc::new(credentials),
                    analytics: Arc::new(InMemoryAnalyticsRepository::new()),
                }
            }
        }
    }

    async fn close(self) {
        if let Self::Postgres { primary, analytics } = self {
            analytics.close().await;
            primary.close().await;
        }
    }
}

/// Start the HTTP server and run until a shutdown signal arrives
///
/// # Errors
/// Returns an error if the database cannot be reached outside local mode,
/// migrations fail, or the listener cannot be bound
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.server.socket_addr().context("invalid server address")?;
    let hasher = Argon2PasswordHasher::from_config(&config.auth)
        .context("invalid password hashing parameters")?;
    let storage = Storage::open(&config).await?;
    let repositories = storage.repositories();

    let (analytics, workers) = AnalyticsSink::spawn(repositories.analytics, &config.analytics);
    let limiter = Arc::new(KeyedRateLimiter::new(RateLimitConfig::from(&config.auth)));
    let eviction = Arc::clone(&limiter)
        .spawn_eviction_task(Duration::from_secs(config.auth.limiter_eviction_interval_seconds));

    let backends = Backends {
        posts: repositories.posts,
        credentials: repositories.credentials,
        accounts: repositories.accounts,
        hasher: Arc::new(hasher),
        analytics,
    };
    let state = build_state(&config, backends, limiter);
    let app = create_app(&config, state);

    info!(%addr, mode = %config.mode, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind listener")?;
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    eviction.abort();
    workers.shutdown(Duration::from_secs(config.analytics.shutdown_grace_seconds)).await;
    storage.close().await;

    served.context("server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
