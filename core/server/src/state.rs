//! Shared service state.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vaultview_adapter::{CliVaultAdapter, LibVaultAdapter, VaultAdapter};
use vaultview_session::{RateLimiter, SessionStore};

use crate::config::{AdapterKind, AppConfig};

/// Login attempts allowed per client within [`LOGIN_WINDOW`].
pub const MAX_LOGIN_ATTEMPTS: usize = 5;
/// Sliding window for login rate limiting.
pub const LOGIN_WINDOW: Duration = Duration::from_secs(300);

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build the service state from loaded configuration.
    pub fn new(config: AppConfig) -> Self {
        let sessions = Arc::new(SessionStore::new(&config.secret_key, config.session_ttl));
        let limiter = Arc::new(RateLimiter::new(MAX_LOGIN_ATTEMPTS, LOGIN_WINDOW));
        Self {
            config: Arc::new(config),
            sessions,
            limiter,
        }
    }

    /// Construct the configured adapter variant for one vault container.
    ///
    /// Dispatch happens here once; everything downstream goes through the
    /// shared trait.
    pub fn adapter_for(&self, vault_path: &Path) -> Arc<dyn VaultAdapter> {
        match self.config.adapter {
            AdapterKind::Cli => Arc::new(
                CliVaultAdapter::new(
                    vault_path.to_path_buf(),
                    self.config.unlock_cmd.clone(),
                    self.config.lock_cmd.clone(),
                    self.config.mount_root.clone(),
                    self.config.mounter.clone(),
                )
                .with_timeouts(self.config.mount_ready_grace, self.config.mount_timeout),
            ),
            AdapterKind::Library => Arc::new(LibVaultAdapter::new(vault_path.to_path_buf())),
        }
    }
}
