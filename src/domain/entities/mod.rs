pub mod account;
pub mod analytics_event;
pub mod post;
pub mod user;

pub use account::*;
pub use analytics_event::*;
pub use post::*;
pub use user::*;
