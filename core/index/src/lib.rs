//! Session-scoped directory index for VaultView.
//!
//! This module provides:
//! - A full-tree snapshot of directory listings, so browsing does not need
//!   to remount the vault on every read
//! - Incremental patching for the mutations that can be tracked cheaply
//! - A derived navigation tree for presentation
//!
//! # Architecture
//! The index is a snapshot: it is correct as of the mount that produced or
//! last patched it. Mutations that can touch arbitrarily deep subtrees are
//! handled by rebuilding the snapshot rather than patching it.

pub mod index;
pub mod tree;

pub use index::DirectoryIndex;
pub use tree::TreeNode;
