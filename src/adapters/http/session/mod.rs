//! HTTP adapter for the session token endpoint.

mod dto;
mod handlers;
mod routes;

pub use dto::SessionTokenResponse;
pub use handlers::{issue_session_token, SessionTokenState};
pub use routes::session_routes;
