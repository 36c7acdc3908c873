mod auth;
mod error_handler;

pub use auth::{auth_middleware, extract_token, token_rejection};
pub use error_handler::log_errors;
