//! The declarative configuration document.
//!
//! Every type deserializes from and serializes to the gateway's declarative format. Fields
//! this model does not name are kept in an [`Extra`] bag, so a document round-trips with
//! the same shape, and unknown values are hashed like any other string.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use self::walk::{Sanitize, Scope, sanitize_entity, sanitize_fields};
use crate::error::SanitizeError;
use crate::expression::{sanitize_address, sanitize_expression};

mod content;
pub(crate) mod walk;

// fields mirror the declarative format one-to-one
#[allow(missing_docs)]
mod certificate;
#[allow(missing_docs)]
mod consumer;
#[allow(missing_docs)]
mod plugin;
#[allow(missing_docs)]
mod service;
#[allow(missing_docs)]
mod upstream;

pub use self::certificate::{CaCertificate, Certificate, Key, KeySet, PemKey, Sni};
pub use self::consumer::{
    Acl, BasicAuth, Consumer, ConsumerGroup, ConsumerGroupPlugin, GroupMember, HmacAuth,
    JwtSecret, KeyAuth, MtlsAuth, Oauth2Credential,
};
pub use self::content::{Content, Info, KonnectMeta};
pub use self::plugin::{Partial, PartialLink, Plugin, Vault};
pub use self::service::{Endpoint, Route, Service};
pub use self::upstream::{Target, Upstream};

/// A reference to another entity, by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    /// Id of the referenced entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the referenced entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

sanitize_entity!(Reference as "references" { id, name });

/// The dynamic configuration of a plugin, partial or vault.
///
/// Its shape is only known from the owner's schema, so it is kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(pub IndexMap<String, Value>);

impl Configuration {
    /// Returns `true` when no key is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl FromIterator<(String, Value)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Keys are checked against the exemptions of the scope the owner opened for it.
impl Sanitize for Configuration {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        sanitize_fields(scope, &self.0)
    }
}

/// Fields of an entity that the model does not name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extra(pub IndexMap<String, Value>);

impl Sanitize for Extra {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        Ok(Self(sanitize_fields(scope, &self.0)?))
    }
}

/// A route-matching expression, e.g. `http.path ^= "/api" && net.port == 443`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct Expression(pub String);

impl Sanitize for Expression {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        Ok(Self(sanitize_expression(scope.values(), &self.0)))
    }
}

/// An IP address or CIDR block.
///
/// Sanitized into a private range of the same family, keeping any prefix length, exactly as
/// the same literal would be inside an [`Expression`]. Values that are not addresses are
/// hashed.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct Address(pub String);

impl Sanitize for Address {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let sanitized = sanitize_address(scope.values(), &self.0)
            .unwrap_or_else(|| scope.string(&self.0));
        Ok(Self(sanitized))
    }
}
