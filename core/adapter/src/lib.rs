//! Vault access backends for VaultView.
//!
//! This module provides a trait-based interface for turning "vault at rest
//! plus passphrase" into a mounted root directory, and the filesystem
//! primitives that operate on it while it stays mounted.
//!
//! # Design Principles
//! - One scoped acquisition per action: open once, operate, release on
//!   every exit path
//! - Backend isolation: callers dispatch through the shared trait only
//! - The passphrase travels to the unlock helper out of band, never on a
//!   command line

pub mod adapter;
pub mod cli;
pub mod library;
pub mod mounted;

pub use adapter::{ByteStream, VaultAdapter};
pub use cli::CliVaultAdapter;
pub use library::LibVaultAdapter;
pub use mounted::MountedVault;
