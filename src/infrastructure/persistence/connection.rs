use crate::infrastructure::config::DatabaseConfig;
use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, warn};

/// Database connection pool wrapper
pub struct Database {
    pool: PgPool,
    name: &'static str,
}

impl Database {
    /// Create the primary connection pool
    ///
    /// # Errors
    /// Returns an error if the database connection fails
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(config, "primary", config.max_connections, config.min_connections).await
    }

    /// Create a smaller pool dedicated to one background concern, so that
    /// its load cannot starve request handling of connections.
    ///
    /// # Errors
    /// Returns an error if the database connection fails
    pub async fn dedicated(
        config: &DatabaseConfig,
        name: &'static str,
        max_connections: u32,
    ) -> Result<Self> {
        Self::connect(config, name, max_connections.max(1), 0).await
    }

    async fn connect(
        config: &DatabaseConfig,
        name: &'static str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        info!(pool = name, "Connecting to PostgreSQL database at {}:{}", config.host, config.port);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections.min(max_connections))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.connection_url())
            .await?;

        let _ = sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!(pool = name, max_connections, "Successfully connected to PostgreSQL database");

        Ok(Self { pool, name })
    }

    /// Apply the embedded schema migrations
    ///
    /// # Errors
    /// Returns an error if a migration fails to apply
    pub async fn migrate(&self) -> Result<()> {
        info!(pool = self.name, "Applying database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is healthy
    ///
    /// # Errors
    /// Returns an error if the health check fails
    pub async fn health_check(&self) -> Result<()> {
        let _ = sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            info!(pool = self.name, "Closing database connection pool");
            self.pool.close().await;
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            warn!(pool = self.name, "Database pool dropped without being explicitly closed");
        }
    }
}
