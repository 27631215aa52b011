pub mod account_repository;
pub mod analytics_repository;
pub mod connection;
pub mod credential_repository;
pub mod memory;
pub mod post_repository;

pub use account_repository::PostgresAccountStore;
pub use analytics_repository::PostgresAnalyticsRepository;
pub use connection::Database;
pub use credential_repository::PostgresCredentialStore;
pub use memory::{
    InMemoryAccountStore, InMemoryAnalyticsRepository, InMemoryCredentialStore, InMemoryPostStore,
};
pub use post_repository::PostgresPostStore;

use crate::domain::repositories::{PersistenceError, StoreError};

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                PersistenceError::Constraint(db.message().to_string())
            }
            _ => PersistenceError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}
