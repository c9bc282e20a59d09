//! Command implementations.

pub mod auth;
pub mod sso;

pub use auth::{handle_login, handle_logout, handle_password, handle_status, handle_token};
pub use sso::handle_sso;
