//! Foundation module - Shared domain primitives.
//!
//! Contains the identifiers and time values that form the vocabulary
//! of the relay domain.

mod ids;
mod timestamp;

pub use ids::{ClientId, ServerId};
pub use timestamp::Timestamp;
