//! Server-held session records.
//!
//! The store owns every session. Handed-out tokens only name a session;
//! all state, including the passphrase and the cached directory index,
//! stays in process memory and dies with the session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use vaultview_common::{Passphrase, VaultId};
use vaultview_index::DirectoryIndex;

use crate::token::TokenSigner;

/// Per-login payload owned by a session.
#[derive(Debug)]
pub struct SessionData {
    /// Which configured vault this login is for.
    pub vault_id: VaultId,
    /// Location of the vault container.
    pub vault_path: PathBuf,
    /// Passphrase, held in memory only.
    pub passphrase: Passphrase,
    /// Cached directory snapshot, if one was built.
    pub index: Option<DirectoryIndex>,
}

/// One authenticated browsing context.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    last_access: Mutex<Instant>,
    data: Mutex<SessionData>,
}

impl Session {
    fn new(id: String, data: SessionData) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_access: Mutex::new(Instant::now()),
            data: Mutex::new(data),
        }
    }

    /// Opaque session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lock the session payload.
    ///
    /// At most one request acts on a session at a time, so this lock is
    /// uncontended in practice; it exists so interleaved requests stay
    /// memory-safe.
    pub fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn idle(&self) -> Duration {
        self.last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn touch(&self) {
        *self
            .last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }
}

/// Signed, expiring session store.
pub struct SessionStore {
    signer: TokenSigner,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    /// Create a store with the given signing secret and idle TTL.
    pub fn new(secret_key: &str, ttl: Duration) -> Self {
        Self {
            signer: TokenSigner::new(secret_key),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session holding `data` and return it.
    pub fn create(&self, data: SessionData) -> Arc<Session> {
        let id = new_session_id();
        let session = Arc::new(Session::new(id.clone(), data));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, session.clone());
        debug!(sessions = self.len(), "session created");
        session
    }

    /// Produce the externally handed-out token for a session.
    pub fn sign(&self, session_id: &str) -> String {
        self.signer.sign(session_id)
    }

    /// Look up a session by signed token.
    ///
    /// Invalid signatures and unknown ids yield `None`. A session whose
    /// idle time exceeds the TTL is evicted at this observation and also
    /// yields `None`. A successful lookup refreshes the idle clock.
    pub fn get(&self, token: &str) -> Option<Arc<Session>> {
        let id = self.signer.verify(token)?;
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()?;

        if session.idle() > self.ttl {
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            // Re-check under the write lock; another request may have
            // refreshed it in the meantime.
            if sessions.get(&id).is_some_and(|s| s.idle() > self.ttl) {
                sessions.remove(&id);
                debug!(sessions = sessions.len(), "expired session evicted");
            }
            return None;
        }

        session.touch();
        Some(session)
    }

    /// Remove a session. Idempotent.
    pub fn destroy(&self, session_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Number of sessions currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
