//! Synthetic replacements for certificates and keys.
//!
//! Hashing a PEM block would leave a document the gateway refuses to load, so credential
//! material is replaced by freshly generated material of the same kind. The forge keeps what
//! it issued per kind: a certificate seen again as a leaf gets the same leaf, and seen as a CA
//! gets the same CA, never one for the other.
//!
//! A replacement is reused only when every original half it stands for was issued together.
//! A private key shared by two different certificates therefore gets a second replacement
//! for the second certificate, and the [`ValueSanitizer`] memo keeps mapping the key to the
//! first one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::CryptoError;
use crate::value::ValueSanitizer;

mod generate;

use self::generate::{
    CaMaterial, LeafPair, RsaPemPair, ca_certificate, leaf_pair, rsa_jwk, rsa_pem_pair,
};

/// Default RSA modulus size for synthetic keys.
pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// Replacements issued so far, keyed by the original material.
#[derive(Default)]
struct Issued {
    leaves: HashMap<String, LeafPair>,
    cas: HashMap<String, CaMaterial>,
    rsa_pairs: HashMap<String, RsaPemPair>,
    jwks: HashMap<String, String>,
}

/// Returns the replacement shared by every original half, if they were all issued together.
fn issued_together<'raw, T>(
    issued: &HashMap<String, T>,
    raws: impl IntoIterator<Item = &'raw str>,
) -> Option<T>
where
    T: Clone + PartialEq,
{
    let mut shared: Option<&T> = None;
    for raw in raws {
        let replacement = issued.get(raw)?;
        match shared {
            Some(previous) if previous != replacement => return None,
            _ => shared = Some(replacement),
        }
    }
    shared.cloned()
}

fn issue<T: Clone>(issued: &mut HashMap<String, T>, raws: &[&str], replacement: &T) {
    for raw in raws {
        issued
            .entry((*raw).to_string())
            .or_insert_with(|| replacement.clone());
    }
}

/// Generates replacement credential material, consistently with the memo.
///
/// Generation runs without holding the lock. Reuse checks and registrations of related
/// values (a certificate and its key, a CA certificate and its digest) are serialized, so
/// a pair is always registered together.
pub(crate) struct CredentialForge {
    issued: Mutex<Issued>,
    rsa_bits: usize,
}

impl fmt::Debug for CredentialForge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialForge")
            .field("rsa_bits", &self.rsa_bits)
            .finish_non_exhaustive()
    }
}

impl CredentialForge {
    pub(crate) fn new(rsa_bits: usize) -> Self {
        Self {
            issued: Mutex::new(Issued::default()),
            rsa_bits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Issued> {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces a certificate and its private key by a fresh self-signed pair.
    pub(crate) fn leaf(
        &self,
        values: &ValueSanitizer,
        cert: &str,
        key: &str,
    ) -> Result<LeafPair, CryptoError> {
        let reused = issued_together(&self.lock().leaves, [cert, key]);
        if let Some(reused) = reused {
            return Ok(reused);
        }

        let fresh = leaf_pair()?;
        let mut issued = self.lock();
        if let Some(reused) = issued_together(&issued.leaves, [cert, key]) {
            return Ok(reused);
        }
        debug!("certificate replaced by a synthetic leaf");
        issue(&mut issued.leaves, &[cert, key], &fresh);
        values.register(cert, fresh.cert.clone());
        values.register(key, fresh.key.clone());
        Ok(fresh)
    }

    /// Replaces a CA certificate by a fresh self-signed CA, with a matching digest.
    ///
    /// When present, the original digest is registered too, so references to it elsewhere
    /// map to the new digest.
    pub(crate) fn ca(
        &self,
        values: &ValueSanitizer,
        cert: &str,
        digest: Option<&str>,
    ) -> Result<CaMaterial, CryptoError> {
        let reused = self.lock().cas.get(cert).cloned();
        let material = match reused {
            Some(reused) => reused,
            None => {
                let fresh = ca_certificate()?;
                let mut issued = self.lock();
                let material = issued
                    .cas
                    .entry(cert.to_string())
                    .or_insert_with(|| {
                        debug!("CA certificate replaced by a synthetic CA");
                        fresh
                    })
                    .clone();
                values.register(cert, material.cert.clone());
                material
            }
        };

        if let Some(digest) = digest {
            values.register(digest, material.digest.clone());
        }
        Ok(material)
    }

    /// Replaces both halves of a PEM key pair by a fresh RSA pair.
    ///
    /// Only the halves present in the input are registered.
    pub(crate) fn rsa_pem(
        &self,
        values: &ValueSanitizer,
        private_key: Option<&str>,
        public_key: Option<&str>,
    ) -> Result<RsaPemPair, CryptoError> {
        let halves = private_key.into_iter().chain(public_key).collect::<Vec<_>>();
        let reused = issued_together(&self.lock().rsa_pairs, halves.iter().copied());
        if let Some(reused) = reused {
            return Ok(reused);
        }

        let fresh = rsa_pem_pair(self.rsa_bits)?;
        let mut issued = self.lock();
        if let Some(reused) = issued_together(&issued.rsa_pairs, halves.iter().copied()) {
            return Ok(reused);
        }
        debug!(bits = self.rsa_bits, "PEM key replaced by a synthetic RSA pair");
        issue(&mut issued.rsa_pairs, &halves, &fresh);
        if let Some(private_key) = private_key {
            values.register(private_key, fresh.private_key.clone());
        }
        if let Some(public_key) = public_key {
            values.register(public_key, fresh.public_key.clone());
        }
        Ok(fresh)
    }

    /// Replaces a JWK by the public JWK of a fresh RSA signing key.
    pub(crate) fn rsa_jwk(
        &self,
        values: &ValueSanitizer,
        jwk: &str,
        kid: Option<&str>,
    ) -> Result<String, CryptoError> {
        let reused = self.lock().jwks.get(jwk).cloned();
        if let Some(reused) = reused {
            return Ok(reused);
        }

        let fresh = rsa_jwk(self.rsa_bits, kid)?;
        let mut issued = self.lock();
        let replacement = issued
            .jwks
            .entry(jwk.to_string())
            .or_insert_with(|| {
                debug!(bits = self.rsa_bits, "JWK replaced by a synthetic RSA key");
                fresh
            })
            .clone();
        values.register(jwk, replacement.clone());
        Ok(replacement)
    }
}
