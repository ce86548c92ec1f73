//! Session token adapters.
//!
//! Implementations of the `SessionTokenIssuer` and `HandshakeAuthorizer`
//! ports:
//!
//! - `session_token` - Stateless HMAC-SHA256 tokens shared across the fleet

mod session_token;

pub use session_token::{HmacSessionTokens, SessionTokenError, TokenRejection, MIN_SECRET_LEN};
