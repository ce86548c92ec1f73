//! Pairlink - Anonymous pairing and signaling relay
//!
//! This crate pairs waiting WebSocket clients two at a time, relays chat and
//! WebRTC signaling between partners, and routes messages across a fleet of
//! relay processes that share one store.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
