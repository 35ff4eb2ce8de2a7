pub mod auth_code;
pub mod client;
pub mod consent;
pub mod session;
pub mod user;
pub mod value_objects;

pub use auth_code::{AuthCode, AuthCodeRow};
pub use client::{Client, GrantType, PublicClient};
pub use consent::Consent;
pub use session::Session;
pub use user::User;
pub use value_objects::{ClientId, CodeChallenge, CodeChallengeMethod, CodeVerifier};
