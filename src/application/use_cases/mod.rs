mod create_post;
mod get_post_media;
mod list_posts;
mod login;
mod register_account;

pub use create_post::CreatePostUseCase;
pub use get_post_media::GetPostMediaUseCase;
pub use list_posts::ListPostsUseCase;
pub use login::{LoggedIn, LoginUseCase};
pub use register_account::RegisterAccountUseCase;
