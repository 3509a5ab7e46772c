//! In-process vault decoding backend.
//!
//! Reserved for vault formats that can be served by a decoding library
//! without an external mount helper. No such library is wired up yet, so
//! every open fails fast instead of silently degrading.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vaultview_common::{Error, Passphrase, Result};

use crate::adapter::VaultAdapter;
use crate::mounted::MountedVault;

/// Library-backed vault adapter (not yet implemented).
pub struct LibVaultAdapter {
    vault_path: PathBuf,
}

impl LibVaultAdapter {
    /// Create an adapter for one vault container.
    pub fn new(vault_path: PathBuf) -> Self {
        Self { vault_path }
    }
}

#[async_trait]
impl VaultAdapter for LibVaultAdapter {
    fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    async fn open(&self, _passphrase: &Passphrase) -> Result<MountedVault> {
        Err(Error::AdapterUnavailable(
            "library backend is not implemented for this vault format yet".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_fails_immediately() {
        let adapter = LibVaultAdapter::new(PathBuf::from("/vaults/demo"));
        let err = adapter.open(&Passphrase::new("pw")).await.unwrap_err();
        assert!(matches!(err, Error::AdapterUnavailable(_)));
    }

    #[tokio::test]
    async fn build_index_fails_through_open() {
        let adapter = LibVaultAdapter::new(PathBuf::from("/vaults/demo"));
        assert!(adapter.build_index(&Passphrase::new("pw")).await.is_err());
    }
}
