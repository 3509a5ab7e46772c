//! Logical vault paths.
//!
//! All user-facing paths are absolute, '/'-rooted POSIX paths that address
//! entries inside a mounted vault, not physical filesystem locations.
//! Parsing collapses empty and `.` segments and hard-rejects `..`, so a
//! normalized path can never escape the mounted root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A normalized absolute path within a vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultPath {
    segments: Vec<String>,
}

impl VaultPath {
    /// The vault root, `/`.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse and normalize a path string.
    ///
    /// Leading slashes are optional; empty and `.` segments are dropped.
    ///
    /// # Errors
    /// - `InvalidPath` if any segment is `..` or contains a backslash
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(Error::InvalidPath(format!(
                        "path traversal rejected: {raw}"
                    )))
                }
                _ if part.contains('\\') => {
                    return Err(Error::InvalidPath(format!(
                        "segment contains a separator: {part}"
                    )))
                }
                _ => segments.push(part.to_string()),
            }
        }
        Ok(Self { segments })
    }

    /// Resolve user input against a current directory.
    ///
    /// Absolute input stands alone; relative input is joined below `current`
    /// before normalization, so traversal in either form is rejected.
    pub fn resolve(current: &VaultPath, input: &str) -> Result<Self> {
        if input.starts_with('/') {
            Self::parse(input)
        } else {
            Self::parse(&format!("{current}/{input}"))
        }
    }

    /// Append a single child segment.
    ///
    /// # Errors
    /// - `InvalidPath` if `child` is empty, `.`, `..`, or contains a separator
    pub fn join(&self, child: &str) -> Result<Self> {
        if child.is_empty() || child == "." || child == ".." {
            return Err(Error::InvalidPath(format!(
                "not a valid entry name: {child:?}"
            )));
        }
        if child.contains('/') || child.contains('\\') {
            return Err(Error::InvalidPath(format!(
                "entry name contains a separator: {child}"
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(child.to_string());
        Ok(Self { segments })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self { segments })
        }
    }

    /// Get the final segment.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Map this logical path onto a mounted root directory.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut fs_path = root.to_path_buf();
        for segment in &self.segments {
            fs_path.push(segment);
        }
        fs_path
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.segments.join("/"))
        }
    }
}
