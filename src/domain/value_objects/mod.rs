pub mod api_key;
pub mod hashtag;
pub mod poll_duration;

pub use api_key::*;
pub use hashtag::*;
pub use poll_duration::*;
