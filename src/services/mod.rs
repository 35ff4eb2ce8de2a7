pub mod auth;
pub mod client;
pub mod consent;
pub mod oauth;
pub mod session;
pub mod user;

pub use auth::AuthService;
pub use client::ClientService;
pub use consent::ConsentService;
pub use oauth::OAuthService;
pub use session::SessionService;
pub use user::UserService;
