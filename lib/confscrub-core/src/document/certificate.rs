use serde::{Deserialize, Serialize};

use super::walk::{Sanitize, Scope, sanitize_entity};
use super::{Extra, Reference};
use crate::error::SanitizeError;
use crate::exemption::EntityType;

/// A TLS certificate and its private key, served for the attached SNIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Alternate certificate, usually of the other key type (RSA or ECDSA).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snis: Vec<Sni>,
    #[serde(flatten)]
    pub extra: Extra,
}

const CERTIFICATES: &str = "certificates";

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|it| !it.is_empty())
}

fn unsupported(entity: &'static str, reason: &str) -> SanitizeError {
    SanitizeError::UnsupportedEntity {
        entity,
        reason: reason.to_string(),
    }
}

impl Sanitize for Certificate {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core(CERTIFICATES))?;
        let (Some(cert), Some(key)) = (present(self.cert.as_ref()), present(self.key.as_ref()))
        else {
            return Err(unsupported(CERTIFICATES, "both `cert` and `key` are required"));
        };

        let main = scope.forge().leaf(scope.values(), cert, key)?;
        let alternate = match (
            present(self.cert_alt.as_ref()),
            present(self.key_alt.as_ref()),
        ) {
            (Some(cert), Some(key)) => Some(scope.forge().leaf(scope.values(), cert, key)?),
            (None, None) => None,
            _ => {
                return Err(unsupported(
                    CERTIFICATES,
                    "`cert_alt` and `key_alt` must be set together",
                ));
            }
        };

        Ok(Self {
            id: scope.field("id", &self.id)?,
            cert: Some(main.cert),
            key: Some(main.key),
            cert_alt: alternate.as_ref().map(|pair| pair.cert.clone()),
            key_alt: alternate.map(|pair| pair.key),
            tags: scope.field("tags", &self.tags)?,
            snis: scope.field("snis", &self.snis)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

/// A server name bound to a certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sni {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(Sni as "snis" { id, name, certificate, tags });

/// A trusted certificate authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaCertificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Hex SHA-256 of the DER-encoded certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_digest: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

const CA_CERTIFICATES: &str = "ca_certificates";

impl Sanitize for CaCertificate {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core(CA_CERTIFICATES))?;
        let Some(cert) = present(self.cert.as_ref()) else {
            return Err(unsupported(CA_CERTIFICATES, "`cert` is required"));
        };

        let digest = present(self.cert_digest.as_ref());
        let ca = scope.forge().ca(scope.values(), cert, digest)?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            cert: Some(ca.cert),
            cert_digest: match digest {
                Some(_) => Some(ca.digest),
                None => self.cert_digest.clone(),
            },
            tags: scope.field("tags", &self.tags)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

/// An asymmetric key, as PEM or JWK, used by plugins to sign or verify tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Key {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A JSON Web Key, as a JSON document in a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pem: Option<PemKey>,
    /// The key set this key belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// PEM-encoded halves of a key pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PemKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

const KEYS: &str = "keys";

impl Sanitize for Key {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core(KEYS))?;
        let pem = self
            .pem
            .as_ref()
            .map(|pem| {
                (
                    present(pem.private_key.as_ref()),
                    present(pem.public_key.as_ref()),
                )
            })
            .filter(|halves| *halves != (None, None));
        let jwk = present(self.jwk.as_ref());
        if pem.is_none() && jwk.is_none() {
            return Err(unsupported(KEYS, "either `pem` or `jwk` material is required"));
        }

        let kid = scope.field("kid", &self.kid)?;
        let pem = match pem {
            Some((private_key, public_key)) => {
                let pair = scope
                    .forge()
                    .rsa_pem(scope.values(), private_key, public_key)?;
                Some(PemKey {
                    private_key: private_key.map(|_| pair.private_key),
                    public_key: public_key.map(|_| pair.public_key),
                })
            }
            None => self.pem.clone(),
        };
        let jwk = jwk
            .map(|jwk| scope.forge().rsa_jwk(scope.values(), jwk, kid.as_deref()))
            .transpose()?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            kid,
            name: scope.field("name", &self.name)?,
            jwk: jwk.or_else(|| self.jwk.clone()),
            pem,
            set: scope.field("set", &self.set)?,
            tags: scope.field("tags", &self.tags)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

/// A named group of keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

sanitize_entity!(KeySet as "key_sets" { id, name, tags, extra });
