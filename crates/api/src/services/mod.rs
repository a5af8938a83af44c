//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Session issuer (password, Google, session tokens)
//! - `orders` - Order lifecycle and ownership rules
//! - `seed` - Admin account created at startup

pub mod auth;
pub mod orders;
pub mod seed;
