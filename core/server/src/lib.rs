//! HTTP service layer for VaultView.
//!
//! This module provides:
//! - Static configuration loading (environment plus the vault registry
//!   file)
//! - The action layer that coordinates adapters, sessions, and the
//!   directory index for every user-facing operation
//! - The JSON API routes and the server entry point
//!
//! # Architecture
//! Handlers stay thin: they authenticate, normalize paths, and delegate to
//! the action layer, which opens the vault exactly once per mutating
//! action and keeps the session's index consistent afterwards.

pub mod actions;
pub mod config;
pub mod routes;
pub mod state;

pub use config::{AdapterKind, AppConfig, VaultConfig};
pub use routes::{router, serve};
pub use state::AppState;
