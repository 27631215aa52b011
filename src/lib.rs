#![deny(clippy::all)]
#![deny(clippy::pedantic)]
// Allow some overly strict pedantic lints for middleware code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! Social Service
//!
//! Backend for a social-network product: authenticated sessions and API
//! keys with per-key rate limiting, an atomic content pipeline for posts,
//! polls, media, hashtags and reshares, and a bounded analytics worker pool.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use application::dto::*;
pub use domain::entities::*;
