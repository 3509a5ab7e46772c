//! Process-backed vault adapter.
//!
//! Mounts a vault by spawning an external unlock helper and releases it by
//! running the matching lock command. The passphrase reaches the helper
//! through its environment, never through the command line, so it cannot
//! leak into a process listing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use vaultview_common::{Error, Passphrase, Result};

use crate::adapter::VaultAdapter;
use crate::mounted::{CliTeardown, MountedVault};

/// Environment variable the unlock helper reads the passphrase from.
pub const PASSPHRASE_ENV: &str = "VAULTVIEW_PASSPHRASE";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Vault adapter backed by external unlock/lock commands.
pub struct CliVaultAdapter {
    vault_path: PathBuf,
    unlock_cmd: PathBuf,
    lock_cmd: PathBuf,
    mount_root: PathBuf,
    mounter: String,
    ready_grace: Duration,
    mount_timeout: Duration,
}

impl CliVaultAdapter {
    /// Create an adapter for one vault container.
    pub fn new(
        vault_path: PathBuf,
        unlock_cmd: PathBuf,
        lock_cmd: PathBuf,
        mount_root: PathBuf,
        mounter: impl Into<String>,
    ) -> Self {
        Self {
            vault_path,
            unlock_cmd,
            lock_cmd,
            mount_root,
            mounter: mounter.into(),
            ready_grace: Duration::from_secs(2),
            mount_timeout: Duration::from_secs(30),
        }
    }

    /// Override the readiness grace period and the hard mount timeout.
    pub fn with_timeouts(mut self, ready_grace: Duration, mount_timeout: Duration) -> Self {
        self.ready_grace = ready_grace;
        self.mount_timeout = mount_timeout;
        self
    }

    async fn spawn_unlock(&self, passphrase: &Passphrase, mount_dir: &Path) -> Result<Child> {
        Command::new(&self.unlock_cmd)
            .arg("unlock")
            .arg("--mountPoint")
            .arg(mount_dir)
            .arg("--password:env")
            .arg(PASSPHRASE_ENV)
            .arg("--mounter")
            .arg(&self.mounter)
            .arg(&self.vault_path)
            .env(PASSPHRASE_ENV, passphrase.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|err| {
                Error::MountFailure(format!(
                    "failed to run {}: {err}",
                    self.unlock_cmd.display()
                ))
            })
    }

    /// Wait until the mount is usable.
    ///
    /// Ready when the helper detaches cleanly, when the mount point shows
    /// up, or when the helper is still serving after the grace period.
    /// A failed helper surfaces its stderr; the hard timeout caps waiting
    /// on a helper that never becomes ready.
    async fn wait_ready(&self, child: &mut Child, mount_dir: &Path) -> Result<()> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                let diagnostic = read_stderr(child).await;
                return Err(Error::MountFailure(if diagnostic.is_empty() {
                    "Failed to unlock vault".to_string()
                } else {
                    diagnostic
                }));
            }
            if is_mount_point(mount_dir) {
                return Ok(());
            }
            if started.elapsed() >= self.mount_timeout {
                return Err(Error::MountFailure(format!(
                    "timed out after {:?} waiting for mount at {}",
                    self.mount_timeout,
                    mount_dir.display()
                )));
            }
            if started.elapsed() >= self.ready_grace {
                // Helper still serving and nothing failed: assume ready,
                // like mounters whose readiness we cannot probe.
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl VaultAdapter for CliVaultAdapter {
    fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    async fn open(&self, passphrase: &Passphrase) -> Result<MountedVault> {
        tokio::fs::create_dir_all(&self.mount_root).await?;
        let mount_dir = self
            .mount_root
            .join(format!("vault-{:08x}", rand::random::<u32>()));
        tokio::fs::create_dir(&mount_dir).await?;
        debug!(
            vault = %self.vault_path.display(),
            mount_dir = %mount_dir.display(),
            "unlocking vault"
        );

        let mut child = match self.spawn_unlock(passphrase, &mount_dir).await {
            Ok(child) => child,
            Err(err) => {
                remove_mount_dir(&mount_dir);
                return Err(err);
            }
        };

        match self.wait_ready(&mut child, &mount_dir).await {
            Ok(()) => Ok(MountedVault::with_teardown(
                mount_dir.clone(),
                CliTeardown {
                    lock_cmd: self.lock_cmd.clone(),
                    mount_dir,
                    child: Some(child),
                },
            )),
            Err(err) => {
                if let Err(kill_err) = child.start_kill() {
                    debug!(error = %kill_err, "unlock helper already gone");
                }
                remove_mount_dir(&mount_dir);
                Err(err)
            }
        }
    }
}

async fn read_stderr(child: &mut Child) -> String {
    let mut buf = Vec::new();
    if let Some(stderr) = child.stderr.as_mut() {
        let _ = stderr.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

fn remove_mount_dir(mount_dir: &Path) {
    if let Err(err) = std::fs::remove_dir(mount_dir) {
        warn!(
            mount_dir = %mount_dir.display(),
            error = %err,
            "could not remove mount directory after failed mount"
        );
    }
}

#[cfg(unix)]
fn is_mount_point(dir: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let Some(parent) = dir.parent() else {
        return false;
    };
    match (std::fs::metadata(dir), std::fs::metadata(parent)) {
        (Ok(dir_meta), Ok(parent_meta)) => dir_meta.dev() != parent_meta.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(_dir: &Path) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use tempfile::TempDir;

    use vaultview_common::VaultPath;

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn adapter(temp: &TempDir, unlock_body: &str, lock_body: &str) -> CliVaultAdapter {
        let unlock = write_script(temp.path(), "unlock.sh", unlock_body);
        let lock = write_script(temp.path(), "lock.sh", lock_body);
        CliVaultAdapter::new(
            temp.path().join("vault.cryptomator"),
            unlock,
            lock,
            temp.path().join("mounts"),
            "test-mounter",
        )
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(5))
    }

    fn passphrase() -> Passphrase {
        Passphrase::new("correct horse")
    }

    fn leftover_mounts(temp: &TempDir) -> Vec<PathBuf> {
        let mounts = temp.path().join("mounts");
        if !mounts.exists() {
            return Vec::new();
        }
        std::fs::read_dir(mounts)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn failed_unlock_surfaces_stderr_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let adapter = adapter(&temp, "echo 'bad passphrase' >&2; exit 1", "exit 0");

        let err = adapter.open(&passphrase()).await.unwrap_err();
        match err {
            Error::MountFailure(msg) => assert!(msg.contains("bad passphrase"), "{msg}"),
            other => panic!("expected MountFailure, got {other}"),
        }
        assert!(leftover_mounts(&temp).is_empty());
    }

    #[tokio::test]
    async fn lock_runs_exactly_once_even_when_the_body_errors() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("lock.log");
        let adapter = adapter(
            &temp,
            "exit 0",
            &format!("echo locked \"$1\" >> {}", log.display()),
        );

        let mounted = adapter.open(&passphrase()).await.unwrap();
        assert!(mounted.root().is_dir());
        // A failing operation must not skip teardown.
        assert!(mounted
            .list_dir(&VaultPath::parse("/missing").unwrap())
            .await
            .is_err());
        drop(mounted);

        let log_body = std::fs::read_to_string(&log).unwrap();
        assert_eq!(log_body.lines().count(), 1);
        assert!(leftover_mounts(&temp).is_empty());
    }

    #[tokio::test]
    async fn passphrase_travels_via_environment() {
        let temp = TempDir::new().unwrap();
        let capture = temp.path().join("seen");
        let adapter = adapter(
            &temp,
            &format!("printf %s \"${PASSPHRASE_ENV}\" > {}; exit 0", capture.display()),
            "exit 0",
        );

        let mounted = adapter.open(&passphrase()).await.unwrap();
        drop(mounted);
        assert_eq!(
            std::fs::read_to_string(&capture).unwrap(),
            "correct horse"
        );
    }

    #[tokio::test]
    async fn build_index_matches_a_fresh_listing() {
        let temp = TempDir::new().unwrap();
        // The stub helper populates the mount point it is handed in $3;
        // the stub lock empties it again, like a real unmount would.
        let adapter = adapter(
            &temp,
            "mkdir -p \"$3/docs/inner\"; printf aaa > \"$3/docs/a.txt\"; printf zz > \"$3/z.txt\"; exit 0",
            "rm -rf \"$1\"/*; exit 0",
        );

        let index = adapter.build_index(&passphrase()).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup("/docs/inner"), Some(&[][..]));

        let from_index = index.lookup("/").unwrap().to_vec();
        let mounted = adapter.open(&passphrase()).await.unwrap();
        let fresh = mounted.list_dir(&VaultPath::root()).await.unwrap();
        drop(mounted);
        assert_eq!(from_index, fresh);
        // Everything is unmounted and cleaned up between the two opens.
        assert!(leftover_mounts(&temp).is_empty());
    }
}
