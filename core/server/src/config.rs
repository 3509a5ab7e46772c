//! Static service configuration.
//!
//! Settings come from the environment; the vault registry comes from a
//! YAML file. Both are read once at startup and immutable afterwards.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use vaultview_common::{Error, Result, VaultId};

/// One vault known to the service.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Unique vault identifier.
    pub id: VaultId,
    /// Location of the vault container on durable storage.
    pub path: PathBuf,
}

/// Which vault backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterKind {
    /// External unlock/lock commands.
    #[default]
    Cli,
    /// In-process decoding library.
    Library,
}

impl FromStr for AdapterKind {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("cli") {
            Ok(Self::Cli)
        } else {
            Ok(Self::Library)
        }
    }
}

/// Service configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Secret used to sign session tokens.
    pub secret_key: String,
    /// Idle time after which a session expires.
    pub session_ttl: Duration,
    /// Maximum accepted upload request size in bytes.
    pub max_upload_bytes: usize,
    /// Build the full directory index at login.
    pub enable_login_index_cache: bool,
    /// Selected vault backend.
    pub adapter: AdapterKind,
    /// External unlock command.
    pub unlock_cmd: PathBuf,
    /// External lock/unmount command.
    pub lock_cmd: PathBuf,
    /// Directory that private mount points are created under.
    pub mount_root: PathBuf,
    /// Mounter identifier handed to the unlock command.
    pub mounter: String,
    /// Grace period before an unprobeable mount counts as ready.
    pub mount_ready_grace: Duration,
    /// Hard cap on waiting for a mount.
    pub mount_timeout: Duration,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    /// Known vaults by id.
    pub vaults: HashMap<String, VaultConfig>,
}

impl AppConfig {
    /// Load configuration from the environment, reading the vault registry
    /// from `VAULTS_CONFIG`.
    ///
    /// # Errors
    /// - `Config` on unparsable numeric settings or a malformed registry
    pub fn from_env() -> Result<Self> {
        let vaults_file =
            env::var("VAULTS_CONFIG").unwrap_or_else(|_| "/config/vaults.yaml".to_string());
        Self::load(Path::new(&vaults_file))
    }

    /// Load configuration with an explicit vault registry path.
    pub fn load(vaults_file: &Path) -> Result<Self> {
        Ok(Self {
            secret_key: env_or("SECRET_KEY", "dev-secret"),
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECONDS", 1800)?),
            max_upload_bytes: env_parse::<usize>("MAX_UPLOAD_MB", 2048)? * 1024 * 1024,
            enable_login_index_cache: env_flag("ENABLE_LOGIN_INDEX_CACHE", true),
            adapter: env_or("ADAPTER", "cli")
                .parse()
                .unwrap_or_default(),
            unlock_cmd: env_or("UNLOCK_CMD", "/usr/bin/cryptomator-cli").into(),
            lock_cmd: env_or("LOCK_CMD", "/usr/bin/umount").into(),
            mount_root: env_or("VAULT_MOUNT_ROOT", "/tmp/mounts").into(),
            mounter: env_or(
                "MOUNTER",
                "org.cryptomator.frontend.fuse.mount.LinuxFuseMountProvider",
            ),
            mount_ready_grace: Duration::from_secs(env_parse("MOUNT_READY_SECS", 2)?),
            mount_timeout: Duration::from_secs(env_parse("MOUNT_TIMEOUT_SECS", 30)?),
            cookie_secure: env_flag("COOKIE_SECURE", false),
            vaults: load_vaults(vaults_file)?,
        })
    }

    /// Look up a configured vault by id.
    pub fn vault(&self, id: &str) -> Option<&VaultConfig> {
        self.vaults.get(id)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => raw.to_lowercase() == "true",
        Err(_) => default,
    }
}

#[derive(Debug, Default, Deserialize)]
struct VaultsFile {
    #[serde(default)]
    vaults: Vec<RawVaultEntry>,
}

#[derive(Debug, Deserialize)]
struct RawVaultEntry {
    id: Option<String>,
    path: Option<PathBuf>,
}

/// Read the vault registry. A missing file means no vaults; entries
/// without an id or path are skipped.
fn load_vaults(path: &Path) -> Result<HashMap<String, VaultConfig>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let parsed: VaultsFile = serde_yaml::from_str(&raw)
        .map_err(|err| Error::Config(format!("malformed vault registry: {err}")))?;

    let mut vaults = HashMap::new();
    for entry in parsed.vaults {
        let (Some(id), Some(path)) = (entry.id, entry.path) else {
            continue;
        };
        let Ok(id) = VaultId::new(id) else {
            continue;
        };
        vaults.insert(
            id.as_str().to_string(),
            VaultConfig { id, path },
        );
    }
    Ok(vaults)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn registry(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_vaults_and_skips_incomplete_entries() {
        let file = registry(
            "vaults:\n\
             \x20 - id: personal\n\
             \x20   path: /vaults/personal\n\
             \x20 - id: missing-path\n\
             \x20 - path: /vaults/orphan\n\
             \x20 - id: work\n\
             \x20   path: /vaults/work\n",
        );
        let vaults = load_vaults(file.path()).unwrap();
        assert_eq!(vaults.len(), 2);
        assert_eq!(vaults["personal"].path, PathBuf::from("/vaults/personal"));
        assert!(vaults.contains_key("work"));
    }

    #[test]
    fn missing_registry_means_no_vaults() {
        let vaults = load_vaults(Path::new("/definitely/not/here.yaml")).unwrap();
        assert!(vaults.is_empty());
    }

    #[test]
    fn malformed_registry_is_a_config_error() {
        let file = registry("vaults: {nope");
        assert!(matches!(
            load_vaults(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn adapter_kind_defaults_to_cli() {
        assert_eq!("cli".parse::<AdapterKind>().unwrap(), AdapterKind::Cli);
        assert_eq!("CLI".parse::<AdapterKind>().unwrap(), AdapterKind::Cli);
        assert_eq!(
            "library".parse::<AdapterKind>().unwrap(),
            AdapterKind::Library
        );
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::load(Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
        assert_eq!(config.max_upload_bytes, 2048 * 1024 * 1024);
        assert!(config.enable_login_index_cache);
        assert_eq!(config.adapter, AdapterKind::Cli);
        assert!(config.vaults.is_empty());
    }
}
