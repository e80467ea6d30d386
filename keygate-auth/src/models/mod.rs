pub mod app_session;
pub mod console_session;
pub mod oauth_state;
pub mod user;

pub use app_session::AppSession;
pub use console_session::ConsoleSession;
pub use oauth_state::OAuthState;
pub use user::{User, UserIdentity, UserResponse};
