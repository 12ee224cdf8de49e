//! Salted, memoized hashing of scalar values.
//!
//! Every hashed literal in a run goes through one [`ValueSanitizer`]. The memo it keeps is
//! what makes the sanitized document self-consistent: a service name used as a primary key
//! and as a cross-reference on a route hashes to the same output both times.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret seed mixed into every hash.
///
/// The salt is zeroed when dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Salt(String);

impl Salt {
    /// Creates a salt from a caller-supplied value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a random 256-bit salt, hex-encoded.
    pub fn random() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(hex::encode(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Salt").field(&"[REDACTED]").finish()
    }
}

impl From<&str> for Salt {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Salt {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Deterministic replacement of raw strings by `hex(sha256(salt + raw))`.
///
/// The memo is append-only: once a raw value has an output, it keeps it for the lifetime of
/// the sanitizer, including outputs registered by the credential handlers.
pub struct ValueSanitizer {
    salt: Salt,
    memo: Mutex<HashMap<String, String>>,
}

impl fmt::Debug for ValueSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSanitizer")
            .field("salt", &self.salt)
            .field("memoized", &self.len())
            .finish()
    }
}

impl ValueSanitizer {
    /// Creates a sanitizer with an empty memo.
    pub fn new(salt: Salt) -> Self {
        Self {
            salt,
            memo: Mutex::default(),
        }
    }

    /// Returns the sanitized form of `raw`, computing and memoizing it on first use.
    pub fn sanitize(&self, raw: &str) -> String {
        let mut memo = self.memo();
        if let Some(sanitized) = memo.get(raw) {
            return sanitized.clone();
        }

        let sanitized = hex::encode(self.hash(raw));
        memo.insert(raw.to_owned(), sanitized.clone());
        sanitized
    }

    /// Returns 32 bytes derived from the sanitized form of `raw`.
    ///
    /// For hashed values these are the digest bytes themselves. When `raw` was registered with
    /// a non-hex replacement, the replacement is hashed again so the bytes stay stable.
    pub(crate) fn digest(&self, raw: &str) -> [u8; 32] {
        let sanitized = self.sanitize(raw);
        hex::decode(&sanitized)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .unwrap_or_else(|| Sha256::digest(sanitized.as_bytes()).into())
    }

    /// Returns the memoized output for `raw`, if any.
    pub(crate) fn lookup(&self, raw: &str) -> Option<String> {
        self.memo().get(raw).cloned()
    }

    /// Registers `sanitized` as the output for `raw` unless one already exists.
    ///
    /// Returns the output that is in effect after the call.
    pub(crate) fn register(&self, raw: &str, sanitized: String) -> String {
        self.memo()
            .entry(raw.to_owned())
            .or_insert(sanitized)
            .clone()
    }

    /// Number of memoized values.
    pub fn len(&self) -> usize {
        self.memo().len()
    }

    /// Returns `true` when nothing has been sanitized yet.
    pub fn is_empty(&self) -> bool {
        self.memo().is_empty()
    }

    fn hash(&self, raw: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(raw.as_bytes());
        hasher.finalize().into()
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_hash_with_salt() {
        let values = ValueSanitizer::new(Salt::new("pepper"));

        let sanitized = values.sanitize("my-service");

        let expected = hex::encode(Sha256::digest(b"peppermy-service"));
        assert_eq!(sanitized, expected);
        assert_eq!(sanitized.len(), 64);
    }

    #[test]
    fn should_memoize_outputs() {
        let values = ValueSanitizer::new(Salt::new("pepper"));

        let first = values.sanitize("secret");
        let second = values.sanitize("secret");

        assert_eq!(first, second);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn should_produce_unrelated_outputs_for_different_salts() {
        let left = ValueSanitizer::new(Salt::new("one"));
        let right = ValueSanitizer::new(Salt::new("two"));

        assert_ne!(left.sanitize("secret"), right.sanitize("secret"));
    }

    #[test]
    fn should_keep_first_registration() {
        let values = ValueSanitizer::new(Salt::new("pepper"));

        let kept = values.register("cert", "first".to_string());
        let again = values.register("cert", "second".to_string());

        assert_eq!(kept, "first");
        assert_eq!(again, "first");
        assert_eq!(values.sanitize("cert"), "first");
        assert_eq!(values.lookup("cert").as_deref(), Some("first"));
    }

    #[test]
    fn should_derive_digest_from_hashed_value() {
        let values = ValueSanitizer::new(Salt::new("pepper"));

        let digest = values.digest("192.168.1.1");

        assert_eq!(hex::encode(digest), values.sanitize("192.168.1.1"));
    }

    #[test]
    fn should_derive_stable_digest_from_registered_value() {
        let values = ValueSanitizer::new(Salt::new("pepper"));
        values.register("material", "-----BEGIN CERTIFICATE-----".to_string());

        assert_eq!(values.digest("material"), values.digest("material"));
    }

    #[test]
    fn should_not_leak_salt_in_debug() {
        let salt = Salt::new("super-secret");

        let debug = format!("{salt:?}");

        assert!(!debug.contains("super-secret"));
        insta::assert_snapshot!(debug, @r#"Salt("[REDACTED]")"#);
    }

    #[test]
    fn should_generate_distinct_random_salts() {
        assert_ne!(Salt::random(), Salt::random());
    }
}
