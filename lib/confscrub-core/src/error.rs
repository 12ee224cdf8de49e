use crate::schema::SchemaTarget;

/// Errors that abort a sanitization run.
///
/// Any of these means no document is returned: a half-sanitized configuration is never
/// handed back to the caller.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum SanitizeError {
    /// A credential-bearing entity does not have a shape the handlers understand.
    ///
    /// Occurs for example when a certificate has no private key, or a key has neither
    /// PEM nor JWK material.
    #[display("Unsupported {entity} entity: {reason}")]
    #[from(skip)]
    UnsupportedEntity {
        /// The entity type, e.g. `certificates`.
        entity: &'static str,
        /// Why the entity could not be handled.
        reason: String,
    },

    /// Synthetic replacement material could not be generated or encoded.
    #[display("Failed to generate replacement credential material: {_0}")]
    CryptoGenerationFailure(CryptoError),

    /// The caller cancelled the run before it completed.
    #[display("Sanitization was cancelled")]
    #[from(skip)]
    Cancelled,
}

/// Failures raised while synthesizing replacement certificates and keys.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum CryptoError {
    /// Certificate or key pair generation error.
    Certificate(rcgen::Error),

    /// RSA key generation error.
    Rsa(rsa::Error),

    /// PKCS#1 encoding error.
    Pkcs1(rsa::pkcs1::Error),

    /// JWK serialization error.
    Jwk(serde_json::Error),
}

/// Errors raised while obtaining an entity schema.
///
/// These are never fatal: the walker logs them and falls back to static exemptions.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum SchemaError {
    /// The provider has no schema for this target.
    #[display("No schema available for '{target}'")]
    #[from(skip)]
    NotFound {
        /// The requested target.
        target: SchemaTarget,
    },

    /// The provider answered, but the payload is not an entity schema.
    #[display("Invalid schema for '{target}': {reason}")]
    #[from(skip)]
    Invalid {
        /// The requested target.
        target: SchemaTarget,
        /// Description of what was wrong.
        reason: String,
    },

    /// The provider is not able to serve schemas in this mode.
    #[display("Schema provider misconfigured: {reason}")]
    #[from(skip)]
    Configuration {
        /// Description of the configuration issue.
        reason: String,
    },

    /// HTTP client error while fetching a schema.
    #[cfg(feature = "admin-api")]
    HttpError(reqwest::Error),

    /// The admin API base URL could not be used.
    #[cfg(feature = "admin-api")]
    UrlError(url::ParseError),
}
