//! Common types used throughout VaultView.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Unique identifier for a configured vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultId(String);

impl VaultId {
    /// Create a new VaultId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Config("vault id cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A vault passphrase, held in memory only and zeroized on drop.
///
/// Never logged and never written to stable storage; `Debug` is redacted.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a passphrase string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Get the plaintext passphrase.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

/// One entry of a directory listing inside a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name, a single path segment.
    pub name: String,
    /// Absolute normalized vault path; its final segment equals `name`.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes, present only for files.
    pub size: Option<u64>,
}

impl DirEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    /// Create a directory entry.
    pub fn dir(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: true,
            size: None,
        }
    }
}

/// Sort a listing into presentation order: directories first, then
/// case-insensitive name order.
pub fn sort_listing(entries: &mut [DirEntry]) {
    entries.sort_by_key(|entry| (!entry.is_dir, entry.name.to_lowercase()));
}
