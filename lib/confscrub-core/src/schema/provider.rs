use std::collections::HashMap;
use std::sync::Arc;

use super::{EntitySchema, SchemaTarget};
use crate::error::SchemaError;

/// Source of entity schemas.
///
/// The sanitizer asks for each target at most once per context. Failures are not fatal:
/// the affected configuration falls back to static exemptions.
///
/// # Example
///
/// ```rust
/// use confscrub_core::{EntitySchema, SchemaError, SchemaProvider, SchemaTarget};
///
/// struct Unreachable;
///
/// impl SchemaProvider for Unreachable {
///     async fn fetch_schema(
///         &self,
///         target: &SchemaTarget,
///         _konnect_mode: bool,
///     ) -> Result<EntitySchema, SchemaError> {
///         Err(SchemaError::NotFound { target: target.clone() })
///     }
/// }
/// ```
pub trait SchemaProvider: Send + Sync {
    /// Fetches the schema for `target`.
    ///
    /// In Konnect mode, implementations query Konnect instead of the gateway admin API,
    /// translating collection names with [`konnect_entity_name`].
    fn fetch_schema(
        &self,
        target: &SchemaTarget,
        konnect_mode: bool,
    ) -> impl Future<Output = Result<EntitySchema, SchemaError>> + Send;
}

impl<P> SchemaProvider for Arc<P>
where
    P: SchemaProvider,
{
    fn fetch_schema(
        &self,
        target: &SchemaTarget,
        konnect_mode: bool,
    ) -> impl Future<Output = Result<EntitySchema, SchemaError>> + Send {
        P::fetch_schema(self, target, konnect_mode)
    }
}

/// Konnect names some entity collections differently from the gateway admin API.
pub fn konnect_entity_name(collection: &str) -> &str {
    match collection {
        "services" => "service",
        "routes" => "route",
        "plugins" => "plugin",
        "consumers" => "consumer",
        "consumer_groups" => "consumer_group",
        "upstreams" => "upstream",
        "targets" => "target",
        "certificates" => "certificate",
        "ca_certificates" => "ca_certificate",
        "snis" => "sni",
        "keys" => "key",
        "key_sets" => "key_set",
        "vaults" => "vault",
        "partials" => "partial",
        other => other,
    }
}

/// In-memory schemas, registered up front.
///
/// Useful offline, and in tests. The same schemas are served in both modes.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    schemas: HashMap<SchemaTarget, EntitySchema>,
}

impl StaticSchemaProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the schema served for `target`.
    #[must_use]
    pub fn with_schema(mut self, target: SchemaTarget, schema: EntitySchema) -> Self {
        self.schemas.insert(target, schema);
        self
    }
}

impl SchemaProvider for StaticSchemaProvider {
    async fn fetch_schema(
        &self,
        target: &SchemaTarget,
        _konnect_mode: bool,
    ) -> Result<EntitySchema, SchemaError> {
        self.schemas
            .get(target)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound {
                target: target.clone(),
            })
    }
}

/// Provider for runs without any schema source: every lookup is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSchemaProvider;

impl SchemaProvider for OfflineSchemaProvider {
    async fn fetch_schema(
        &self,
        target: &SchemaTarget,
        _konnect_mode: bool,
    ) -> Result<EntitySchema, SchemaError> {
        Err(SchemaError::NotFound {
            target: target.clone(),
        })
    }
}
