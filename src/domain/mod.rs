//! Domain layer containing relay types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (client and server ids, timestamps)
//! - `relay` - Wire protocol, routed signals, pairing roles and directory records

pub mod foundation;
pub mod relay;
