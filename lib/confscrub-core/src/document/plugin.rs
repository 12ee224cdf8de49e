use serde::{Deserialize, Serialize};

use super::walk::{Sanitize, Scope, sanitize_entity};
use super::{Configuration, Extra};
use crate::error::SanitizeError;
use crate::exemption::EntityType;
use crate::schema::SchemaTarget;

/// A plugin instance, global or attached to a service, route, consumer or consumer group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plugin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Configuration::is_empty")]
    pub config: Configuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partials: Vec<PartialLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Plugin {
    /// The schema describing this plugin's configuration.
    pub fn schema_target(&self) -> Option<SchemaTarget> {
        named_target(self.name.as_deref(), SchemaTarget::Plugin)
    }
}

impl Sanitize for Plugin {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core("plugins"))?;
        let config_scope = scope.enter(EntityType::Config(self.schema_target()))?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            name: scope.field("name", &self.name)?,
            instance_name: scope.field("instance_name", &self.instance_name)?,
            enabled: scope.field("enabled", &self.enabled)?,
            protocols: scope.field("protocols", &self.protocols)?,
            // plugin names only
            ordering: self.ordering.clone(),
            config: self.config.sanitize(&config_scope)?,
            service: scope.field("service", &self.service)?,
            route: scope.field("route", &self.route)?,
            consumer: scope.field("consumer", &self.consumer)?,
            consumer_group: scope.field("consumer_group", &self.consumer_group)?,
            partials: scope.field("partials", &self.partials)?,
            tags: scope.field("tags", &self.tags)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

/// Link from a plugin to a partial it draws shared configuration from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the partial is mounted in the plugin configuration, e.g. `config.redis`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

sanitize_entity!(PartialLink as "partial_links" { id, name, path });

/// Configuration shared by several plugins, e.g. a Redis connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Partial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The partial type, e.g. `redis-ee`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Configuration::is_empty")]
    pub config: Configuration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Partial {
    /// The schema describing this partial's configuration.
    pub fn schema_target(&self) -> Option<SchemaTarget> {
        named_target(self.kind.as_deref(), SchemaTarget::Partial)
    }
}

impl Sanitize for Partial {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core("partials"))?;
        let config_scope = scope.enter(EntityType::Config(self.schema_target()))?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            name: scope.field("name", &self.name)?,
            kind: scope.field("type", &self.kind)?,
            config: self.config.sanitize(&config_scope)?,
            tags: scope.field("tags", &self.tags)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

/// A secret store referenced by `{vault://prefix/...}` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vault {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The vault implementation, e.g. `env` or `hcv`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Configuration::is_empty")]
    pub config: Configuration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Vault {
    /// The schema describing this vault's configuration.
    pub fn schema_target(&self) -> Option<SchemaTarget> {
        named_target(self.name.as_deref(), SchemaTarget::Vault)
    }
}

impl Sanitize for Vault {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core("vaults"))?;
        let config_scope = scope.enter(EntityType::Config(self.schema_target()))?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            name: scope.field("name", &self.name)?,
            prefix: scope.field("prefix", &self.prefix)?,
            description: scope.field("description", &self.description)?,
            config: self.config.sanitize(&config_scope)?,
            tags: scope.field("tags", &self.tags)?,
            extra: scope.field("extra", &self.extra)?,
        })
    }
}

pub(super) fn named_target(
    name: Option<&str>,
    target: fn(String) -> SchemaTarget,
) -> Option<SchemaTarget> {
    name.filter(|name| !name.is_empty())
        .map(|name| target(name.to_string()))
}
