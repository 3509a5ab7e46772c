//! Session and login-attempt state for VaultView.
//!
//! This module provides:
//! - Server-held session records that own the passphrase and the directory
//!   index for the lifetime of a login
//! - Tamper-evident session tokens, so a cookie only ever names a session
//!   and the server-held store stays the sole source of truth
//! - A sliding-window rate limiter for login attempts

pub mod rate_limit;
pub mod store;
pub mod token;

pub use rate_limit::RateLimiter;
pub use store::{Session, SessionData, SessionStore};
pub use token::TokenSigner;
