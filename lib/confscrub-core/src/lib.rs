//! # Confscrub Core
//!
//! Sanitize declarative API gateway configuration so it can be shared safely.
//!
//! A sanitized document keeps the structure of the original and stays loadable by the
//! gateway, while every identifying value is replaced:
//!
//! - strings are replaced by a salted SHA-256 hash, consistently across the whole run, so a
//!   service name still matches the routes and plugins referring to it
//! - certificates and keys are replaced by freshly generated material of the same kind
//! - IP addresses and CIDR blocks are moved to private ranges of the same family
//! - route-matching expressions keep their syntax, only the compared values change
//! - values from a closed vocabulary (protocols, HTTP methods, plugin names, enumerated
//!   plugin settings, ...) are kept
//!
//! ## Quick Start
//!
//! ```rust
//! use confscrub_core::{Content, OfflineSchemaProvider, Sanitizer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let content: Content = serde_json::from_str(r#"{
//!     "_format_version": "3.0",
//!     "services": [{
//!         "name": "billing",
//!         "url": "http://billing.internal:8080",
//!         "routes": [{"name": "invoices", "paths": ["/invoices"], "methods": ["GET"]}]
//!     }]
//! }"#)?;
//!
//! let sanitizer = Sanitizer::builder(OfflineSchemaProvider)
//!     .with_salt("shared-with-support")
//!     .build();
//! let sanitized = sanitizer.sanitize(&content).await?;
//!
//! let output = serde_json::to_string_pretty(&sanitized)?;
//! assert!(!output.contains("billing"));
//! assert!(output.contains(r#""GET""#));
//! # Ok(())
//! # }
//! ```
//!
//! ## Schemas
//!
//! Plugin, partial and vault configurations are free-form. To know which of their settings
//! come from a closed vocabulary, the sanitizer asks a [`SchemaProvider`] for the entity
//! schema:
//!
//! - [`OfflineSchemaProvider`] never answers: only the built-in exemptions apply
//! - [`StaticSchemaProvider`] serves schemas registered up front
//! - `AdminSchemaProvider` (feature `admin-api`) queries the gateway admin API, or Konnect
//!
//! A schema that cannot be fetched is logged and the run goes on with the built-in
//! exemptions.
//!
//! ## Determinism
//!
//! With the same salt, the same input always gives the same output, with one exception:
//! certificate and key material. Replacement certificates and keys are generated from fresh
//! randomness and a validity window starting now, so a document holding credentials differs
//! between runs in those fields only. Within one sanitizer, a certificate occurring several
//! times is replaced by the same material everywhere.
//!
//! Sanitizing is not idempotent: sanitizing a sanitized document hashes the hashes again.
//!
//! ## Error Handling
//!
//! - [`SanitizeError`] aborts a run, no partial document is returned
//! - [`SchemaError`] is only reported by providers, and never aborts a run
//!
//! ## Logging
//!
//! Events are emitted with [`tracing`]; install a subscriber to see them.

mod credentials;
mod document;
mod error;
mod exemption;
mod expression;
mod sanitizer;
mod schema;
mod value;

pub use tokio_util::sync::CancellationToken;

pub use self::credentials::DEFAULT_RSA_KEY_BITS;
pub use self::document::{
    Acl, Address, BasicAuth, CaCertificate, Certificate, Configuration, Consumer, ConsumerGroup,
    ConsumerGroupPlugin, Content, Endpoint, Expression, Extra, GroupMember, HmacAuth, Info,
    JwtSecret, Key, KeyAuth, KeySet, KonnectMeta, MtlsAuth, Oauth2Credential, Partial,
    PartialLink, PemKey, Plugin, Reference, Route, Service, Sni, Target, Upstream, Vault,
};
pub use self::error::{CryptoError, SanitizeError, SchemaError};
pub use self::exemption::{EntityType, ExemptionCache};
pub use self::sanitizer::{Sanitizer, SanitizerBuilder};
pub use self::schema::{
    EntitySchema, FieldType, OfflineSchemaProvider, SchemaField, SchemaNode, SchemaProvider,
    SchemaTarget, StaticSchemaProvider, konnect_entity_name,
};
#[cfg(feature = "admin-api")]
pub use self::schema::{AdminSchemaProvider, AdminSchemaProviderBuilder, AdminToken};
pub use self::value::{Salt, ValueSanitizer};
