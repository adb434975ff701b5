//! Shared-secret authorization
//!
//! Every transport keeps its own set of granted principals. A principal is
//! granted by sending the process secret verbatim; grants are never revoked.

use crate::error::RtdlError;
use parking_lot::RwLock;
use rand::Rng;
use rtdl_types::TransportKind;
use std::collections::HashSet;
use std::fmt;

const SECRET_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SECRET_MIN_LEN: usize = 10;
const SECRET_MAX_LEN: usize = 20;
/// Supplied secrets must be longer than this after trimming
const SUPPLIED_MIN_LEN: usize = 5;

/// The process-wide shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSecret(String);

impl AuthSecret {
    /// Use the supplied secret when it is long enough, otherwise generate one
    pub fn from_supplied_or_random(supplied: Option<&str>) -> Self {
        match supplied.map(str::trim) {
            Some(s) if s.chars().count() > SUPPLIED_MIN_LEN => Self(s.to_string()),
            _ => Self::random(),
        }
    }

    /// Random alphanumeric secret of 10 to 20 characters
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let len = rng.gen_range(SECRET_MIN_LEN..=SECRET_MAX_LEN);
        let code = (0..len)
            .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, supplied: &str) -> bool {
        self.0 == supplied
    }
}

// Keep the secret out of logs
impl fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthSecret(***)")
    }
}

/// Granted principals of a single transport
#[derive(Debug, Default)]
pub struct AuthGate {
    principals: RwLock<HashSet<String>>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, principal_id: &str) -> bool {
        self.principals.read().contains(principal_id)
    }

    fn grant(&self, principal_id: &str) {
        self.principals.write().insert(principal_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.principals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.read().is_empty()
    }
}

/// Authorization state for every transport
#[derive(Debug)]
pub struct Authorizer {
    secret: AuthSecret,
    telegram: AuthGate,
    nostr: AuthGate,
}

impl Authorizer {
    pub fn new(secret: AuthSecret) -> Self {
        Self {
            secret,
            telegram: AuthGate::new(),
            nostr: AuthGate::new(),
        }
    }

    pub fn secret(&self) -> &AuthSecret {
        &self.secret
    }

    pub fn gate(&self, transport: TransportKind) -> &AuthGate {
        match transport {
            TransportKind::Telegram => &self.telegram,
            TransportKind::Nostr => &self.nostr,
        }
    }

    pub fn is_authorized(&self, transport: TransportKind, principal_id: &str) -> bool {
        self.gate(transport).contains(principal_id)
    }

    /// `Unauthenticated` unless `principal_id` was granted on `transport`
    pub fn require(&self, transport: TransportKind, principal_id: &str) -> Result<(), RtdlError> {
        if self.is_authorized(transport, principal_id) {
            Ok(())
        } else {
            Err(RtdlError::Unauthenticated)
        }
    }

    /// Grant `principal_id` on `transport` iff `supplied` equals the secret exactly
    pub fn try_authorize(&self, transport: TransportKind, principal_id: &str, supplied: &str) -> bool {
        if !self.secret.matches(supplied) {
            return false;
        }
        self.gate(transport).grant(principal_id);
        true
    }

    /// Number of granted principals on `transport`
    pub fn authorized_count(&self, transport: TransportKind) -> usize {
        self.gate(transport).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> Authorizer {
        Authorizer::new(AuthSecret::from_supplied_or_random(Some("Sup3rSecretCode")))
    }

    #[test]
    fn test_random_secret_shape() {
        for _ in 0..50 {
            let secret = AuthSecret::random();
            let len = secret.as_str().len();
            assert!((SECRET_MIN_LEN..=SECRET_MAX_LEN).contains(&len));
            assert!(secret.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_short_supplied_secret_is_replaced() {
        let secret = AuthSecret::from_supplied_or_random(Some("  abc  "));
        assert_ne!(secret.as_str(), "abc");
        assert!(secret.as_str().len() >= SECRET_MIN_LEN);

        let secret = AuthSecret::from_supplied_or_random(Some(" letmein42 "));
        assert_eq!(secret.as_str(), "letmein42");
    }

    #[test]
    fn test_wrong_text_leaves_membership_unchanged() {
        let auth = authorizer();
        for attempt in ["hello", "sup3rsecretcode", "Sup3rSecretCode ", "", "Sup3rSecretCod"] {
            assert!(!auth.try_authorize(TransportKind::Telegram, "42", attempt));
        }
        assert!(!auth.is_authorized(TransportKind::Telegram, "42"));
        assert_eq!(auth.authorized_count(TransportKind::Telegram), 0);
    }

    #[test]
    fn test_exact_secret_grants() {
        let auth = authorizer();
        assert!(auth.try_authorize(TransportKind::Telegram, "42", "Sup3rSecretCode"));
        assert!(auth.is_authorized(TransportKind::Telegram, "42"));
        // granting again is idempotent
        assert!(auth.try_authorize(TransportKind::Telegram, "42", "Sup3rSecretCode"));
        assert_eq!(auth.authorized_count(TransportKind::Telegram), 1);
    }

    #[test]
    fn test_transports_are_independent() {
        let auth = authorizer();
        assert!(auth.try_authorize(TransportKind::Nostr, "npub-alice", "Sup3rSecretCode"));
        assert!(!auth.is_authorized(TransportKind::Telegram, "npub-alice"));
        assert!(auth.is_authorized(TransportKind::Nostr, "npub-alice"));
    }

    #[test]
    fn test_require_reports_unauthenticated() {
        let auth = authorizer();
        assert!(matches!(
            auth.require(TransportKind::Telegram, "42"),
            Err(RtdlError::Unauthenticated)
        ));
        auth.try_authorize(TransportKind::Telegram, "42", "Sup3rSecretCode");
        assert!(auth.require(TransportKind::Telegram, "42").is_ok());
        assert!(auth.require(TransportKind::Nostr, "42").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let auth = authorizer();
        assert!(!format!("{:?}", auth).contains("Sup3rSecretCode"));
    }
}
