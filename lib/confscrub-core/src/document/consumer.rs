use serde::{Deserialize, Serialize};

use super::plugin::named_target;
use super::walk::{Sanitize, Scope, sanitize_entity};
use super::{Configuration, Extra, Plugin, Reference};
use crate::error::SanitizeError;
use crate::exemption::EntityType;
use crate::schema::SchemaTarget;

/// A client of the gateway, with its credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Consumer groups this consumer belongs to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyauth_credentials: Vec<KeyAuth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub basicauth_credentials: Vec<BasicAuth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hmacauth_credentials: Vec<HmacAuth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jwt_secrets: Vec<JwtSecret>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oauth2_credentials: Vec<Oauth2Credential>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<Acl>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mtls_auth_credentials: Vec<MtlsAuth>,
    #[serde(flatten)]
    pub extra: Extra,
}

sanitize_entity!(Consumer as "consumers" {
    id,
    username,
    custom_id,
    tags,
    groups,
    plugins,
    keyauth_credentials,
    basicauth_credentials,
    hmacauth_credentials,
    jwt_secrets,
    oauth2_credentials,
    acls,
    mtls_auth_credentials,
    extra,
});

/// An API key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(KeyAuth as "keyauth_credentials" { id, key, ttl, tags });

/// A username and password.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(BasicAuth as "basicauth_credentials" { id, username, password, tags });

/// An HMAC signing secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmacAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(HmacAuth as "hmacauth_credentials" { id, username, secret, tags });

/// A JWT issuer key and its verification material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSecret {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsa_public_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(JwtSecret as "jwt_secrets" {
    id,
    key,
    algorithm,
    secret,
    rsa_public_key,
    tags,
});

/// An OAuth 2.0 client registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oauth2Credential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_secret: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(Oauth2Credential as "oauth2_credentials" {
    id,
    name,
    client_id,
    client_secret,
    redirect_uris,
    hash_secret,
    tags,
});

/// Membership of an access-control group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Acl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(Acl as "acls" { id, group, tags });

/// A client certificate subject accepted for mutual TLS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MtlsAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

sanitize_entity!(MtlsAuth as "mtls_auth_credentials" {
    id,
    subject_name,
    ca_certificate,
    tags,
});

/// A named set of consumers sharing plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<GroupMember>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<ConsumerGroupPlugin>,
    #[serde(flatten)]
    pub extra: Extra,
}

sanitize_entity!(ConsumerGroup as "consumer_groups" {
    id,
    name,
    tags,
    consumers,
    plugins,
    extra,
});

/// A consumer listed as member of a consumer group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
}

sanitize_entity!(GroupMember as "consumer_group_members" { id, username, custom_id });

/// Plugin settings overridden for the members of a consumer group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerGroupPlugin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Configuration::is_empty")]
    pub config: Configuration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ConsumerGroupPlugin {
    /// The schema describing the overridden plugin configuration.
    pub fn schema_target(&self) -> Option<SchemaTarget> {
        named_target(self.name.as_deref(), SchemaTarget::Plugin)
    }
}

impl Sanitize for ConsumerGroupPlugin {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let scope = scope.enter(EntityType::Core("consumer_group_plugins"))?;
        let config_scope = scope.enter(EntityType::Config(self.schema_target()))?;

        Ok(Self {
            id: scope.field("id", &self.id)?,
            name: scope.field("name", &self.name)?,
            config: self.config.sanitize(&config_scope)?,
            tags: scope.field("tags", &self.tags)?,
        })
    }
}
