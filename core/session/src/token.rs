//! Tamper-evident session tokens.
//!
//! A token is `<session id>.<mac>` where the MAC is a keyed BLAKE2b tag
//! over the id. The token carries no session data; forging or altering one
//! byte makes verification fail, and verification runs in constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use blake2::digest::consts::U32;
use blake2::digest::{KeyInit, Mac};
use blake2::{Blake2b, Blake2bMac, Digest};
use subtle::ConstantTimeEq;

type KeyDigest = Blake2b<U32>;
type TokenMac = Blake2bMac<U32>;

const KEY_CONTEXT: &[u8] = b"vaultview.session.token.v1";

/// Signs and verifies session tokens with a key derived from the
/// application secret.
pub struct TokenSigner {
    key: [u8; 32],
}

impl TokenSigner {
    /// Derive the signing key from the configured secret.
    pub fn new(secret: &str) -> Self {
        let mut digest = KeyDigest::new();
        digest.update(KEY_CONTEXT);
        digest.update(secret.as_bytes());
        Self {
            key: digest.finalize().into(),
        }
    }

    fn tag(&self, session_id: &str) -> [u8; 32] {
        let mut mac = <TokenMac as KeyInit>::new_from_slice(&self.key)
            .expect("32-byte key is always a valid BLAKE2b MAC key");
        mac.update(session_id.as_bytes());
        mac.finalize().into_bytes().into()
    }

    /// Produce the externally handed-out token for a session id.
    pub fn sign(&self, session_id: &str) -> String {
        let tag = self.tag(session_id);
        format!("{session_id}.{}", URL_SAFE_NO_PAD.encode(tag))
    }

    /// Verify a token and return the session id it names.
    ///
    /// Any malformed, truncated, or altered token yields `None`.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (session_id, sig) = token.rsplit_once('.')?;
        if session_id.is_empty() {
            return None;
        }
        let given = URL_SAFE_NO_PAD.decode(sig).ok()?;
        let expected = self.tag(session_id);
        if given.len() != expected.len() {
            return None;
        }
        if bool::from(expected.ct_eq(&given)) {
            Some(session_id.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let signer = TokenSigner::new("secret");
        let token = signer.sign("abc123");
        assert_eq!(signer.verify(&token), Some("abc123".to_string()));
    }

    #[test]
    fn any_single_byte_flip_is_rejected() {
        let signer = TokenSigner::new("secret");
        let token = signer.sign("abc123");
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] ^= 0x01;
            if let Ok(tampered) = String::from_utf8(tampered) {
                assert_eq!(signer.verify(&tampered), None, "byte {i} accepted");
            }
        }
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let ours = TokenSigner::new("secret");
        let theirs = TokenSigner::new("other-secret");
        let token = theirs.sign("abc123");
        assert_eq!(ours.verify(&token), None);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let signer = TokenSigner::new("secret");
        for garbage in ["", "no-dot", ".", "id.", ".sig", "id.!!!not-base64!!!"] {
            assert_eq!(signer.verify(garbage), None, "{garbage:?}");
        }
    }
}
