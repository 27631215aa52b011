use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

/// Signing secret used when none is configured. Refused in production.
pub const DEV_JWT_SECRET: &str = "local-development-secret-do-not-deploy";

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Runtime mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Local,
    Production,
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Invalid runtime mode: {s}. Valid values: local, production")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: RuntimeMode,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub run_migrations: bool,
}

/// Authentication gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub key_lookup_timeout_ms: u64,
    /// Steady-state requests per second allowed per API key.
    pub rate_limit_per_second: f64,
    /// Requests a fresh or idle key may make back to back.
    pub rate_limit_burst: u32,
    pub rate_limit_max_keys: usize,
    pub limiter_eviction_interval_seconds: u64,
    /// Argon2id memory cost in KiB.
    pub password_memory_kib: u32,
    pub password_iterations: u32,
    pub password_parallelism: u32,
    pub min_password_length: usize,
}

/// Analytics worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    /// Size of the dedicated connection pool used by analytics workers.
    pub max_connections: u32,
    pub shutdown_grace_seconds: u64,
}

/// Content pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub write_timeout_ms: u64,
}

impl AppConfig {
    /// Load configuration based on runtime mode
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn load() -> Result<Self, config::ConfigError> {
        let mode = std::env::var("RUN_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<RuntimeMode>()
            .map_err(config::ConfigError::Message)?;

        Self::load_for_mode(mode)
    }

    /// Load configuration for a specific runtime mode
    ///
    /// Sources, lowest precedence first: built-in defaults for `mode`,
    /// `.env.local` (local mode only), then `SOCIAL_SERVICE_*` environment
    /// variables using `__` between nested keys, e.g.
    /// `SOCIAL_SERVICE_AUTH__JWT_SECRET`.
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn load_for_mode(mode: RuntimeMode) -> Result<Self, config::ConfigError> {
        if mode == RuntimeMode::Local {
            dotenvy::from_filename(".env.local").ok();
        }

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::defaults(mode))?)
            .add_source(
                config::Environment::with_prefix("SOCIAL_SERVICE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("mode", mode.to_string())?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults for `mode`.
    #[must_use]
    pub fn defaults(mode: RuntimeMode) -> Self {
        let (host, run_migrations) = match mode {
            RuntimeMode::Local => ("127.0.0.1", true),
            RuntimeMode::Production => ("0.0.0.0", false),
        };

        Self {
            mode,
            server: ServerConfig {
                host: host.to_string(),
                port: 3000,
                request_timeout_seconds: 30,
                max_body_bytes: 1_048_576,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 10,
                host: "localhost".to_string(),
                port: 5432,
                database: "social".to_string(),
                user: "postgres".to_string(),
                password: String::new(),
                run_migrations,
            },
            auth: AuthConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                key_lookup_timeout_ms: 2_000,
                rate_limit_per_second: 100.0,
                rate_limit_burst: 100,
                rate_limit_max_keys: 100_000,
                limiter_eviction_interval_seconds: 60,
                password_memory_kib: 19_456,
                password_iterations: 2,
                password_parallelism: 1,
                min_password_length: 8,
            },
            analytics: AnalyticsConfig {
                queue_capacity: 1_024,
                workers: 2,
                max_connections: 2,
                shutdown_grace_seconds: 10,
            },
            pipeline: PipelineConfig { write_timeout_ms: 5_000 },
        }
    }

    /// Reject settings the service cannot safely run with.
    ///
    /// # Errors
    /// Returns a message describing the first invalid setting found
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let fail = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));

        if self.mode == RuntimeMode::Production
            && (self.auth.jwt_secret == DEV_JWT_SECRET
                || self.auth.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN)
        {
            return fail("auth.jwt_secret must be set to a secret of at least 32 bytes in production");
        }
        if self.auth.jwt_secret.is_empty() {
            return fail("auth.jwt_secret must not be empty");
        }
        let rate = self.auth.rate_limit_per_second;
        if rate.is_nan() || rate <= 0.0 || self.auth.rate_limit_burst == 0 {
            return fail("auth rate limit must allow at least one request");
        }
        if self.auth.limiter_eviction_interval_seconds == 0 {
            return fail("auth.limiter_eviction_interval_seconds must be positive");
        }
        if argon2::Params::new(
            self.auth.password_memory_kib,
            self.auth.password_iterations,
            self.auth.password_parallelism,
            None,
        )
        .is_err()
        {
            return fail("auth password hashing costs are outside Argon2 limits");
        }
        if self.auth.min_password_length == 0 {
            return fail("auth.min_password_length must be positive");
        }
        if self.analytics.workers == 0 || self.analytics.queue_capacity == 0 {
            return fail("analytics.workers and analytics.queue_capacity must be positive");
        }
        if self.pipeline.write_timeout_ms == 0 {
            return fail("pipeline.write_timeout_ms must be positive");
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Get the socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    /// Get the `PostgreSQL` connection URL
    ///
    /// If url is provided, use it directly. Otherwise, construct from components.
    #[must_use]
    pub fn connection_url(&self) -> String {
        if self.url.is_empty() {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            )
        } else {
            self.url.clone()
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn key_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.key_lookup_timeout_ms)
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
