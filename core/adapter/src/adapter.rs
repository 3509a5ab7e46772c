//! Vault adapter trait definition.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use vaultview_common::{DirEntry, Passphrase, Result, VaultPath};
use vaultview_index::DirectoryIndex;

use crate::mounted::MountedVault;

/// Byte stream type for upload/download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Access to one vault at rest.
///
/// `open` is the single acquisition point: it mounts the vault and returns
/// a [`MountedVault`] whose drop releases the mount, so teardown runs on
/// every exit path. All filesystem primitives live on the returned handle.
#[async_trait]
pub trait VaultAdapter: Send + Sync {
    /// Location of the vault container on durable storage.
    fn vault_path(&self) -> &Path;

    /// Mount the vault and return the scoped root handle.
    ///
    /// # Errors
    /// - `MountFailure` if the vault cannot be unlocked
    /// - `AdapterUnavailable` if this backend cannot serve the vault format
    async fn open(&self, passphrase: &Passphrase) -> Result<MountedVault>;

    /// Mount once, list every reachable directory, and unmount.
    ///
    /// Each directory is visited exactly once; traversal order is not
    /// observable in the result.
    async fn build_index(&self, passphrase: &Passphrase) -> Result<DirectoryIndex> {
        let mounted = self.open(passphrase).await?;
        let result = walk_mounted(&mounted).await;
        drop(mounted);
        result
    }
}

async fn walk_mounted(mounted: &MountedVault) -> Result<DirectoryIndex> {
    let root_entries = mounted.list_dir(&VaultPath::root()).await?;
    let mut index = DirectoryIndex::new();
    let mut pending: Vec<DirEntry> = root_entries
        .iter()
        .filter(|entry| entry.is_dir)
        .cloned()
        .collect();
    index.insert("/", root_entries);

    while let Some(dir) = pending.pop() {
        let children = mounted.list_dir(&VaultPath::parse(&dir.path)?).await?;
        pending.extend(children.iter().filter(|entry| entry.is_dir).cloned());
        index.insert(dir.path, children);
    }

    Ok(index)
}
