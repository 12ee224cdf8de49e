//! The sanitization context.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credentials::{CredentialForge, DEFAULT_RSA_KEY_BITS};
use crate::document::Content;
use crate::document::walk::{Sanitize, Scope, Walker};
use crate::error::SanitizeError;
use crate::exemption::{EntityType, ExemptionCache};
use crate::expression::sanitize_expression;
use crate::schema::{SchemaProvider, SchemaTarget};
use crate::value::{Salt, ValueSanitizer};

/// Sanitizes configuration documents.
///
/// A sanitizer owns everything that must stay consistent across a run: the salt, the memo of
/// sanitized values and the exemptions derived from schemas. Sanitizing several documents
/// with the same sanitizer keeps values consistent across them.
///
/// # Example
///
/// ```rust
/// use confscrub_core::{Content, OfflineSchemaProvider, Sanitizer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let content: Content = serde_json::from_str(
///     r#"{"services": [{"name": "billing", "host": "billing.internal", "port": 8080}]}"#,
/// )?;
///
/// let sanitizer = Sanitizer::builder(OfflineSchemaProvider)
///     .with_salt("a-stable-salt")
///     .build();
/// let sanitized = sanitizer.sanitize(&content).await?;
///
/// let service = &sanitized.services[0];
/// assert_ne!(service.name.as_deref(), Some("billing"));
/// assert_eq!(service.port, Some(8080));
/// # Ok(())
/// # }
/// ```
///
/// # Determinism
///
/// Two sanitizers built with the same salt give byte-identical output for the same input,
/// except for certificate and key material, which is freshly generated by each sanitizer.
///
/// # Idempotence
///
/// Sanitizing is not idempotent: a sanitized document is a new input, and sanitizing it
/// again hashes every hash and regenerates every certificate.
#[derive(Debug)]
pub struct Sanitizer<P> {
    provider: P,
    konnect_mode: bool,
    values: ValueSanitizer,
    exemptions: ExemptionCache,
    forge: CredentialForge,
}

/// Builder for [`Sanitizer`].
///
/// # Default Configuration
///
/// - **Salt**: random, so outputs differ between sanitizers
/// - **Konnect mode**: off, schemas are requested from the gateway admin API
/// - **RSA key size**: 2048 bits
#[derive(Debug)]
pub struct SanitizerBuilder<P> {
    provider: P,
    salt: Option<Salt>,
    konnect_mode: bool,
    rsa_key_bits: usize,
}

impl<P> Sanitizer<P>
where
    P: SchemaProvider,
{
    /// Starts building a sanitizer that reads entity schemas from `provider`.
    pub fn builder(provider: P) -> SanitizerBuilder<P> {
        SanitizerBuilder {
            provider,
            salt: None,
            konnect_mode: false,
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
        }
    }

    /// Returns a sanitized copy of `content`.
    ///
    /// # Errors
    ///
    /// Fails when a certificate or key cannot be replaced: either its shape is not
    /// supported, or replacement material could not be generated. No partial document is
    /// returned.
    pub async fn sanitize(&self, content: &Content) -> Result<Content, SanitizeError> {
        self.sanitize_with_cancellation(content, &CancellationToken::new())
            .await
    }

    /// Returns a sanitized copy of `content`, stopping early once `cancellation` fires.
    ///
    /// Schemas are fetched first, then the document is walked with one thread per top-level
    /// collection. The walk is CPU-bound and blocks the calling task; on a shared runtime,
    /// call this from `spawn_blocking` or a dedicated runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Sanitizer::sanitize`], plus [`SanitizeError::Cancelled`] when the token was
    /// cancelled before the run completed.
    pub async fn sanitize_with_cancellation(
        &self,
        content: &Content,
        cancellation: &CancellationToken,
    ) -> Result<Content, SanitizeError> {
        for target in content.schema_targets() {
            if self.exemptions.is_warm(&target) {
                continue;
            }
            tokio::select! {
                biased;
                () = cancellation.cancelled() => return Err(SanitizeError::Cancelled),
                () = self.warm(target) => {}
            }
        }

        let walker = Walker {
            values: &self.values,
            exemptions: &self.exemptions,
            forge: &self.forge,
            cancellation,
        };
        let sanitized = content.sanitize(&Scope::new(walker, EntityType::Root));

        if cancellation.is_cancelled() {
            return Err(SanitizeError::Cancelled);
        }
        let sanitized = sanitized?;
        debug!(memoized = self.values.len(), "document sanitized");
        Ok(sanitized)
    }

    /// Hashes a single value, consistently with the documents sanitized so far.
    ///
    /// Empty strings are kept.
    pub fn sanitize_str(&self, raw: &str) -> String {
        if raw.is_empty() {
            String::new()
        } else {
            self.values.sanitize(raw)
        }
    }

    /// Sanitizes a route-matching expression, consistently with the documents sanitized so
    /// far.
    pub fn sanitize_expression(&self, expression: &str) -> String {
        sanitize_expression(&self.values, expression)
    }

    /// Whether schemas are requested from Konnect.
    pub fn konnect_mode(&self) -> bool {
        self.konnect_mode
    }

    async fn warm(&self, target: SchemaTarget) {
        match self.provider.fetch_schema(&target, self.konnect_mode).await {
            Ok(schema) => self.exemptions.warm(target, &schema),
            Err(error) => {
                warn!(%target, %error, "schema unavailable, only static exemptions apply");
                self.exemptions.mark_unavailable(target);
            }
        }
    }
}

impl<P> SanitizerBuilder<P>
where
    P: SchemaProvider,
{
    /// Sets the salt mixed into every hash.
    ///
    /// Two runs with the same salt produce the same hashes for the same input.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<Salt>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Requests schemas from Konnect instead of the gateway admin API.
    #[must_use]
    pub fn with_konnect_mode(mut self, konnect_mode: bool) -> Self {
        self.konnect_mode = konnect_mode;
        self
    }

    /// Sets the modulus size of the synthetic RSA keys.
    #[must_use]
    pub fn with_rsa_key_bits(mut self, bits: usize) -> Self {
        self.rsa_key_bits = bits;
        self
    }

    /// Builds the sanitizer.
    pub fn build(self) -> Sanitizer<P> {
        let Self {
            provider,
            salt,
            konnect_mode,
            rsa_key_bits,
        } = self;

        Sanitizer {
            provider,
            konnect_mode,
            values: ValueSanitizer::new(salt.unwrap_or_else(Salt::random)),
            exemptions: ExemptionCache::new(),
            forge: CredentialForge::new(rsa_key_bits),
        }
    }
}
