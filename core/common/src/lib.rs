//! Common utilities and types shared across VaultView modules.
//!
//! This module provides foundational types that are used throughout the
//! codebase, ensuring consistency and type safety.

pub mod error;
pub mod path;
pub mod types;

pub use error::{Error, Result};
pub use path::VaultPath;
pub use types::{sort_listing, DirEntry, Passphrase, VaultId};
