//! Use cases and the transactional content pipeline.

pub mod content_pipeline;
pub mod dto;
pub mod use_cases;

use std::time::Duration;
use thiserror::Error;

use crate::domain::repositories::PersistenceError;
use crate::infrastructure::security::PasswordHashError;

pub use content_pipeline::ContentPipeline;

/// Input rejected before any storage is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error("Missing or invalid userID")]
    InvalidAuthor,

    #[error("originalPostID must be a positive post identifier")]
    InvalidOriginalPost,

    #[error("Poll question is required")]
    MissingPollQuestion,

    #[error("Poll duration type and length are required")]
    MissingPollDuration,

    #[error("{0}")]
    InvalidPollDuration(String),

    #[error("Poll requires at least one option")]
    MissingPollOptions,

    #[error("Poll options must not be blank")]
    BlankPollOption,

    #[error("{0}")]
    InvalidPagination(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
}

/// Failure of a content pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist post: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("post write exceeded {0:?}")]
    Timeout(Duration),
}

/// Failure while registering an account or logging in.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("An account with that email or username already exists")]
    AlreadyExists,

    /// Covers both an unknown account and a wrong password.
    #[error("Invalid login credentials")]
    InvalidLogin,

    #[error("failed to access accounts: {0}")]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
}
