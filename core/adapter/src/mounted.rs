//! Scoped handle to a mounted vault.
//!
//! The handle owns the mount for its lifetime: dropping it runs the
//! unmount command and cleans up the mount directory, so the mount cannot
//! outlive the operation that acquired it.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use vaultview_common::{sort_listing, DirEntry, Error, Result, VaultPath};

use crate::adapter::ByteStream;

const WRITE_FLUSH_THRESHOLD: usize = 1024 * 1024;

/// Teardown recipe for a mount produced by an external unlock helper.
#[derive(Debug)]
pub(crate) struct CliTeardown {
    pub lock_cmd: PathBuf,
    pub mount_dir: PathBuf,
    pub child: Option<tokio::process::Child>,
}

/// A mounted vault root.
///
/// Filesystem primitives are only reachable through this handle, which
/// guarantees they run between mount and unmount.
#[derive(Debug)]
pub struct MountedVault {
    root: PathBuf,
    teardown: Option<CliTeardown>,
}

impl MountedVault {
    pub(crate) fn with_teardown(root: PathBuf, teardown: CliTeardown) -> Self {
        Self {
            root,
            teardown: Some(teardown),
        }
    }

    /// Wrap a directory whose lifetime is managed elsewhere.
    ///
    /// Used by backends that do not spawn an unmount step, and by tests.
    pub fn unmanaged(root: PathBuf) -> Self {
        Self {
            root,
            teardown: None,
        }
    }

    /// The mounted root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &VaultPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    /// List the direct children of a directory, in presentation order.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `InvalidPath` if the path is not a directory
    pub async fn list_dir(&self, path: &VaultPath) -> Result<Vec<DirEntry>> {
        let target = self.resolve(path);
        let meta = fs::metadata(&target)
            .await
            .map_err(|_| Error::NotFound(format!("Path does not exist: {path}")))?;
        if !meta.is_dir() {
            return Err(Error::InvalidPath(format!("Not a directory: {path}")));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&target).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            let meta = item.metadata().await?;
            entries.push(DirEntry {
                path: child_path(path, &name),
                name,
                is_dir: meta.is_dir(),
                size: meta.is_file().then(|| meta.len()),
            });
        }
        sort_listing(&mut entries);
        Ok(entries)
    }

    /// Read a whole file into memory.
    ///
    /// # Errors
    /// - `NotFound` if absent or not a regular file
    pub async fn read_file(&self, path: &VaultPath) -> Result<Vec<u8>> {
        let target = self.resolve(path);
        let is_file = fs::metadata(&target)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(Error::NotFound(format!("File not found: {path}")));
        }
        Ok(fs::read(&target).await?)
    }

    /// Read a file as a byte stream.
    pub async fn read_stream(&self, path: &VaultPath) -> Result<ByteStream> {
        let data = self.read_file(path).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    /// Write a file from a byte stream, creating parent directories and
    /// overwriting any existing file.
    ///
    /// Chunks are written as they arrive; at most one chunk is buffered.
    /// Returns the number of bytes written.
    pub async fn write_file(&self, path: &VaultPath, mut stream: ByteStream) -> Result<u64> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&target).await?;
        let mut written: u64 = 0;
        let mut unflushed = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            unflushed += chunk.len();
            if unflushed >= WRITE_FLUSH_THRESHOLD {
                file.flush().await?;
                unflushed = 0;
            }
        }
        file.flush().await?;
        Ok(written)
    }

    /// Create a directory, including missing parents.
    ///
    /// # Errors
    /// - `AlreadyExists` if the directory itself already exists
    pub async fn make_dir(&self, path: &VaultPath) -> Result<()> {
        let target = self.resolve(path);
        if fs::metadata(&target).await.is_ok() {
            return Err(Error::AlreadyExists(format!("{path}")));
        }
        fs::create_dir_all(&target).await?;
        Ok(())
    }

    /// Move an entry (file or directory) into a destination directory,
    /// keeping its name.
    ///
    /// # Errors
    /// - `NotFound` if the source is absent
    /// - `InvalidPath` if the destination is not a directory
    /// - `AlreadyExists` on a name collision at the destination
    pub async fn move_entry(&self, source: &VaultPath, dest_dir: &VaultPath) -> Result<()> {
        let (from, to) = self.transfer_targets(source, dest_dir).await?;
        fs::rename(&from, &to).await?;
        Ok(())
    }

    /// Copy an entry into a destination directory. Directory copies are
    /// deep.
    ///
    /// Fails like [`move_entry`](Self::move_entry).
    pub async fn copy_entry(&self, source: &VaultPath, dest_dir: &VaultPath) -> Result<()> {
        let (from, to) = self.transfer_targets(source, dest_dir).await?;
        if fs::metadata(&from).await?.is_dir() {
            copy_tree(from, to).await
        } else {
            fs::copy(&from, &to).await?;
            Ok(())
        }
    }

    /// Delete an entry; directories are removed recursively.
    ///
    /// # Errors
    /// - `NotFound` if the path is absent
    pub async fn delete_entry(&self, path: &VaultPath) -> Result<()> {
        let target = self.resolve(path);
        let meta = fs::metadata(&target)
            .await
            .map_err(|_| Error::NotFound(format!("Path not found: {path}")))?;
        if meta.is_dir() {
            fs::remove_dir_all(&target).await?;
        } else {
            fs::remove_file(&target).await?;
        }
        Ok(())
    }

    /// Shared validation for move and copy.
    async fn transfer_targets(
        &self,
        source: &VaultPath,
        dest_dir: &VaultPath,
    ) -> Result<(PathBuf, PathBuf)> {
        let from = self.resolve(source);
        if fs::metadata(&from).await.is_err() {
            return Err(Error::NotFound(format!("Path not found: {source}")));
        }
        let dest = self.resolve(dest_dir);
        let dest_is_dir = fs::metadata(&dest)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !dest_is_dir {
            return Err(Error::InvalidPath(format!(
                "Destination is not a directory: {dest_dir}"
            )));
        }
        let name = source
            .name()
            .ok_or_else(|| Error::InvalidPath("cannot move or copy the root".to_string()))?;
        let to = dest.join(name);
        if fs::metadata(&to).await.is_ok() {
            return Err(Error::AlreadyExists(format!("{dest_dir}/{name}")));
        }
        Ok((from, to))
    }
}

fn child_path(parent: &VaultPath, name: &str) -> String {
    if parent.is_root() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Deep-copy a directory, iteratively to keep the recursion off the stack.
async fn copy_tree(from: PathBuf, to: PathBuf) -> Result<()> {
    let mut queue = vec![(from, to)];
    while let Some((src, dst)) = queue.pop() {
        fs::create_dir(&dst).await?;
        let mut dir = fs::read_dir(&src).await?;
        while let Some(item) = dir.next_entry().await? {
            let child_src = item.path();
            let child_dst = dst.join(item.file_name());
            if item.file_type().await?.is_dir() {
                queue.push((child_src, child_dst));
            } else {
                fs::copy(&child_src, &child_dst).await?;
            }
        }
    }
    Ok(())
}

impl Drop for MountedVault {
    fn drop(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        let CliTeardown {
            lock_cmd,
            mount_dir,
            child,
        } = teardown;

        debug!(mount_dir = %mount_dir.display(), "unmounting vault");
        match std::process::Command::new(&lock_cmd).arg(&mount_dir).output() {
            Ok(output) if !output.status.success() => {
                warn!(
                    status = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "unmount command failed"
                );
            }
            Err(err) => warn!(error = %err, "could not run unmount command"),
            _ => {}
        }
        drop(child);

        // Stray files first, then the now-empty mount directory.
        if let Ok(dir) = std::fs::read_dir(&mount_dir) {
            for item in dir.flatten() {
                let is_file = item.file_type().map(|t| t.is_file()).unwrap_or(false);
                if is_file {
                    let _ = std::fs::remove_file(item.path());
                }
            }
        }
        if let Err(err) = std::fs::remove_dir(&mount_dir) {
            warn!(
                mount_dir = %mount_dir.display(),
                error = %err,
                "could not remove mount directory"
            );
        }
    }
}
