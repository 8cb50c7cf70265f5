//! # Middleware
//!
//! Request-level layers applied ahead of the route handlers. Identity
//! resolution lives in [`crate::auth`].

pub mod rate_limit;
