//! Action layer: one vault operation per user action.
//!
//! Every mutating action opens the vault exactly once, performs its
//! operation, releases the mount, and then brings the session's index back
//! in line: cheap targeted patches where the effect is local (upload,
//! mkdir), a full rebuild where it is not (move, copy, delete). A rebuild
//! that fails clears the index so later reads fall back to per-request
//! mounts instead of serving stale data.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use vaultview_adapter::{ByteStream, VaultAdapter};
use vaultview_common::{DirEntry, Passphrase, Result, VaultPath};
use vaultview_index::{DirectoryIndex, TreeNode};
use vaultview_session::Session;

use crate::config::VaultConfig;
use crate::state::AppState;

/// Validate a login by opening the vault once.
///
/// Returns the freshly built index when login-time caching is enabled.
pub async fn validate_login(
    state: &AppState,
    vault: &VaultConfig,
    passphrase: &Passphrase,
) -> Result<Option<DirectoryIndex>> {
    let adapter = state.adapter_for(&vault.path);
    if state.config.enable_login_index_cache {
        let index = adapter.build_index(passphrase).await?;
        info!(vault = %vault.id, directories = index.len(), "index built at login");
        Ok(Some(index))
    } else {
        let mounted = adapter.open(passphrase).await?;
        mounted.list_dir(&VaultPath::root()).await?;
        drop(mounted);
        Ok(None)
    }
}

/// List a directory for a session.
///
/// Served from the index when one is present; otherwise falls back to a
/// fresh mount for this single listing.
pub async fn list_entries(
    state: &AppState,
    session: &Session,
    path: &VaultPath,
) -> Result<Vec<DirEntry>> {
    let (vault_path, passphrase) = {
        let data = session.data();
        if let Some(index) = &data.index {
            return Ok(index
                .lookup(&path.to_string())
                .map(|entries| entries.to_vec())
                .unwrap_or_default());
        }
        (data.vault_path.clone(), data.passphrase.clone())
    };

    let adapter = state.adapter_for(&vault_path);
    let mounted = adapter.open(&passphrase).await?;
    let entries = mounted.list_dir(path).await?;
    drop(mounted);
    Ok(entries)
}

/// Build the navigation tree, if the session has an index.
pub fn navigation_tree(session: &Session) -> Option<TreeNode> {
    session
        .data()
        .index
        .as_ref()
        .map(|index| TreeNode::build(index, "/"))
}

/// Upload a file into `dir`, then patch the index in place.
pub async fn upload(
    state: &AppState,
    session: &Session,
    dir: &VaultPath,
    filename: &str,
    stream: ByteStream,
) -> Result<()> {
    let target = dir.join(filename)?;
    let (adapter, passphrase) = session_adapter(state, session);

    let mounted = adapter.open(&passphrase).await?;
    let written = mounted.write_file(&target, stream).await?;
    drop(mounted);

    if let Some(index) = session.data().index.as_mut() {
        index.record_file(dir, filename, Some(written))?;
    }
    info!(path = %target, bytes = written, "upload complete");
    Ok(())
}

/// Create a directory under `dir`, then patch the index in place.
pub async fn make_dir(
    state: &AppState,
    session: &Session,
    dir: &VaultPath,
    folder_name: &str,
) -> Result<()> {
    let target = dir.join(folder_name)?;
    let (adapter, passphrase) = session_adapter(state, session);

    let mounted = adapter.open(&passphrase).await?;
    mounted.make_dir(&target).await?;
    drop(mounted);

    if let Some(index) = session.data().index.as_mut() {
        index.record_dir(dir, folder_name)?;
    }
    info!(path = %target, "folder created");
    Ok(())
}

/// Move an entry into a destination directory, then rebuild the index.
pub async fn move_entry(
    state: &AppState,
    session: &Session,
    source: &VaultPath,
    dest_dir: &VaultPath,
) -> Result<()> {
    let (adapter, passphrase) = session_adapter(state, session);
    let mounted = adapter.open(&passphrase).await?;
    let outcome = mounted.move_entry(source, dest_dir).await;
    drop(mounted);
    if outcome.is_ok() {
        refresh_index(state, session).await;
        info!(source = %source, dest = %dest_dir, "entry moved");
    }
    outcome
}

/// Copy an entry into a destination directory, then rebuild the index.
pub async fn copy_entry(
    state: &AppState,
    session: &Session,
    source: &VaultPath,
    dest_dir: &VaultPath,
) -> Result<()> {
    let (adapter, passphrase) = session_adapter(state, session);
    let mounted = adapter.open(&passphrase).await?;
    let outcome = mounted.copy_entry(source, dest_dir).await;
    drop(mounted);
    if outcome.is_ok() {
        refresh_index(state, session).await;
        info!(source = %source, dest = %dest_dir, "entry copied");
    }
    outcome
}

/// Delete a batch of entries in one mount, then rebuild the index.
///
/// Entries already deleted before a failure stay deleted, so the index is
/// rebuilt even on the error path.
pub async fn delete_entries(
    state: &AppState,
    session: &Session,
    paths: &[VaultPath],
) -> Result<()> {
    let (adapter, passphrase) = session_adapter(state, session);
    let mounted = adapter.open(&passphrase).await?;
    let mut outcome = Ok(());
    let mut deleted = 0usize;
    for path in paths {
        match mounted.delete_entry(path).await {
            Ok(()) => deleted += 1,
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    drop(mounted);
    if deleted > 0 {
        refresh_index(state, session).await;
    }
    info!(deleted, requested = paths.len(), "batch delete finished");
    outcome
}

/// Read a file for download. Returns the attachment name and its bytes.
pub async fn download(
    state: &AppState,
    session: &Session,
    path: &VaultPath,
) -> Result<(String, Vec<u8>)> {
    let name = path
        .name()
        .ok_or_else(|| vaultview_common::Error::InvalidPath("cannot download the root".into()))?
        .to_string();
    let (adapter, passphrase) = session_adapter(state, session);
    let mounted = adapter.open(&passphrase).await?;
    let data = mounted.read_file(path).await?;
    drop(mounted);
    Ok((name, data))
}

/// Rebuild the session's index snapshot after a structural mutation.
///
/// Skipped when the session never held an index. On failure the index is
/// cleared, which downgrades the session to per-request listings.
pub async fn refresh_index(state: &AppState, session: &Session) {
    let (vault_path, passphrase) = {
        let data = session.data();
        if data.index.is_none() {
            return;
        }
        (data.vault_path.clone(), data.passphrase.clone())
    };

    let adapter = state.adapter_for(&vault_path);
    match adapter.build_index(&passphrase).await {
        Ok(index) => {
            session.data().index = Some(index);
        }
        Err(err) => {
            warn!(error = %err, "index rebuild failed, reverting to per-request listings");
            session.data().index = None;
        }
    }
}

fn session_adapter(state: &AppState, session: &Session) -> (Arc<dyn VaultAdapter>, Passphrase) {
    let data = session.data();
    let vault_path: PathBuf = data.vault_path.clone();
    let passphrase = data.passphrase.clone();
    drop(data);
    (state.adapter_for(&vault_path), passphrase)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use vaultview_common::VaultId;
    use vaultview_session::SessionData;

    use crate::config::{AdapterKind, AppConfig};

    use super::*;

    fn test_state(adapter: AdapterKind) -> AppState {
        AppState::new(AppConfig {
            secret_key: "secret".into(),
            session_ttl: Duration::from_secs(60),
            max_upload_bytes: 1024 * 1024,
            enable_login_index_cache: true,
            adapter,
            unlock_cmd: "/bin/false".into(),
            lock_cmd: "/bin/true".into(),
            mount_root: std::env::temp_dir().join("vaultview-test-mounts"),
            mounter: "test".into(),
            mount_ready_grace: Duration::from_millis(100),
            mount_timeout: Duration::from_secs(2),
            cookie_secure: false,
            vaults: HashMap::new(),
        })
    }

    fn session_with_index(state: &AppState, index: Option<DirectoryIndex>) -> Arc<Session> {
        state.sessions.create(SessionData {
            vault_id: VaultId::new("demo").unwrap(),
            vault_path: Path::new("/vaults/demo").to_path_buf(),
            passphrase: Passphrase::new("pw"),
            index,
        })
    }

    fn small_index() -> DirectoryIndex {
        let mut index = DirectoryIndex::new();
        index.insert(
            "/",
            vec![DirEntry::dir("docs", "/docs"), DirEntry::file("a", "/a", Some(1))],
        );
        index.insert("/docs", vec![]);
        index
    }

    #[tokio::test]
    async fn list_entries_uses_the_index_without_mounting() {
        // The library backend cannot open anything, so a successful
        // listing proves no mount was attempted.
        let state = test_state(AdapterKind::Library);
        let session = session_with_index(&state, Some(small_index()));

        let entries = list_entries(&state, &session, &VaultPath::root())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        // Paths unknown to the snapshot list as empty.
        let missing = list_entries(&state, &session, &VaultPath::parse("/ghost").unwrap())
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn list_entries_without_index_propagates_backend_failure() {
        let state = test_state(AdapterKind::Library);
        let session = session_with_index(&state, None);
        assert!(list_entries(&state, &session, &VaultPath::root())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn navigation_tree_requires_an_index() {
        let state = test_state(AdapterKind::Library);
        let with = session_with_index(&state, Some(small_index()));
        let without = session_with_index(&state, None);

        let tree = navigation_tree(&with).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].path, "/docs");
        assert!(navigation_tree(&without).is_none());
    }

    #[tokio::test]
    async fn refresh_index_clears_the_snapshot_when_rebuild_fails() {
        let state = test_state(AdapterKind::Library);
        let session = session_with_index(&state, Some(small_index()));

        refresh_index(&state, &session).await;
        assert!(session.data().index.is_none());
    }

    #[tokio::test]
    async fn refresh_index_is_a_no_op_without_a_snapshot() {
        let state = test_state(AdapterKind::Library);
        let session = session_with_index(&state, None);
        refresh_index(&state, &session).await;
        assert!(session.data().index.is_none());
    }

    #[tokio::test]
    async fn upload_rejects_compound_filenames_before_mounting() {
        let state = test_state(AdapterKind::Library);
        let session = session_with_index(&state, Some(small_index()));
        let stream: ByteStream = Box::pin(futures::stream::empty());
        let err = upload(&state, &session, &VaultPath::root(), "a/b.txt", stream)
            .await
            .unwrap_err();
        assert!(matches!(err, vaultview_common::Error::InvalidPath(_)));
    }
}
