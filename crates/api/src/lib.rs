//! Watch Shop API library.
//!
//! This crate provides the backend as a library, allowing it to be booted
//! in-process by tests and reused by the CLI.
//!
//! # Layers
//!
//! - [`db`] - Credential and order stores (`PostgreSQL` or a JSON file)
//! - [`services`] - Session issuer and order lifecycle rules
//! - [`routes`] / [`middleware`] - The JSON HTTP surface
//! - [`state`] / [`config`] / [`error`] - Wiring shared by all of the above

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

pub use routes::app;
pub use state::AppState;
