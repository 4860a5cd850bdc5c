//! # Station Agent Library
//!
//! Keeps one vendor bearer token alive for a fleet of battery-rental
//! cabinets and exposes slot queries and pop commands over HTTP.
//!
//! Modules:
//! - `config`: YAML service configuration, loading and validation
//! - `store`: durable single-token store (SQL or in-memory)
//! - `login`: strategies that mint a fresh token
//! - `refresh`: single-flight token refresh shared by all callers
//! - `resilience`: call outcome classification and refresh-and-retry-once
//! - `vendor`: cabinet API client
//! - `stations`: slot queries and pop commands
//! - `server`: axum routes and response envelope

pub mod config;
pub mod login;
pub mod observability;
pub mod refresh;
pub mod resilience;
pub mod server;
pub mod stations;
pub mod store;
pub mod utils;
pub mod vendor;

#[cfg(test)]
mod tests;

pub use crate::config::service::ServiceConfig;
