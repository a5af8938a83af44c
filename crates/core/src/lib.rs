//! Watch Shop Core - Shared domain types.
//!
//! This crate provides the types used across all Watch Shop components:
//! - `api` - HTTP backend (authentication and order lifecycle)
//! - `client` - Client-side session cache and API client
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and lets the client
//! and the server agree on the wire format without sharing any runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles and the order status machine
//! - [`models`] - Users, orders and the JSON request/response bodies

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
