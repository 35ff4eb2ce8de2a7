pub mod session_auth;

pub use session_auth::{
    session_auth_middleware, session_auth_or_login_middleware, AuthSession, SESSION_COOKIE,
};
