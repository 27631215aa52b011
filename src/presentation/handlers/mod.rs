pub mod accounts;
pub mod posts;

pub use posts::AppState;
