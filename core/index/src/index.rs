//! Full-tree snapshot of vault directory listings.

use std::collections::HashMap;

use vaultview_common::{sort_listing, DirEntry, Result, VaultPath};

/// Mapping from absolute directory path to its direct children.
///
/// Every directory that appears as an `is_dir` entry somewhere in the map
/// also has its own key once the index is fully built, so any directory a
/// client can navigate into is immediately listable. Listings are kept in
/// presentation order: directories first, then case-insensitive name order.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    listings: HashMap<String, Vec<DirEntry>>,
}

impl DirectoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the listing for one directory path.
    pub fn insert(&mut self, path: impl Into<String>, entries: Vec<DirEntry>) {
        self.listings.insert(path.into(), entries);
    }

    /// Get the children of a directory, if the path is known.
    pub fn lookup(&self, path: &str) -> Option<&[DirEntry]> {
        self.listings.get(path).map(|entries| entries.as_slice())
    }

    /// Number of directories in the snapshot.
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Check if the snapshot holds no directories.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Iterate over all known directory paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.listings.keys().map(|k| k.as_str())
    }

    /// Record a freshly uploaded file without remounting.
    ///
    /// Inserts the entry into `dir`'s listing and restores sort order.
    ///
    /// # Errors
    /// - `InvalidPath` if `name` is not a single path segment
    pub fn record_file(&mut self, dir: &VaultPath, name: &str, size: Option<u64>) -> Result<()> {
        let path = dir.join(name)?;
        let entries = self.listings.entry(dir.to_string()).or_default();
        entries.push(DirEntry::file(name, path.to_string(), size));
        sort_listing(entries);
        Ok(())
    }

    /// Record a freshly created directory without remounting.
    ///
    /// Inserts the entry into `dir`'s listing and registers the new
    /// directory's own empty listing so it is immediately listable.
    ///
    /// # Errors
    /// - `InvalidPath` if `name` is not a single path segment
    pub fn record_dir(&mut self, dir: &VaultPath, name: &str) -> Result<()> {
        let path = dir.join(name)?;
        let entries = self.listings.entry(dir.to_string()).or_default();
        entries.push(DirEntry::dir(name, path.to_string()));
        sort_listing(entries);
        self.listings.entry(path.to_string()).or_default();
        Ok(())
    }
}
