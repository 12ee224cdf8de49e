use std::sync::{Mutex, PoisonError};
use std::thread::{self, ScopedJoinHandle};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::walk::{Sanitize, Scope, Walker, sanitize_entity};
use super::{
    CaCertificate, Certificate, Consumer, ConsumerGroup, Extra, Key, KeySet, Partial, Plugin,
    Route, Service, Sni, Upstream, Vault,
};
use crate::error::SanitizeError;
use crate::exemption::EntityType;
use crate::schema::SchemaTarget;

/// A complete declarative configuration.
///
/// The root metadata fields (`_format_version`, `_transform`, `_workspace`, `_konnect`)
/// are never sanitized. `_info.select_tags` are, so they keep matching the entity tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Content {
    /// Version of the declarative format, e.g. `3.0`.
    #[serde(rename = "_format_version", skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Whether secrets must be transformed (hashed) by the gateway on import.
    #[serde(rename = "_transform", skip_serializing_if = "Option::is_none")]
    pub transform: Option<bool>,
    /// Target workspace.
    #[serde(rename = "_workspace", skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Target Konnect control plane.
    #[serde(rename = "_konnect", skip_serializing_if = "Option::is_none")]
    pub konnect: Option<KonnectMeta>,
    /// Document-wide defaults.
    #[serde(rename = "_info", skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<Consumer>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumer_groups: Vec<ConsumerGroup>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upstreams: Vec<Upstream>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snis: Vec<Sni>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ca_certificates: Vec<CaCertificate>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<Key>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_sets: Vec<KeySet>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vaults: Vec<Vault>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partials: Vec<Partial>,
    /// Root fields the model does not name.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Konnect control plane a document is synced to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KonnectMeta {
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_name: Option<String>,
    /// Former name of the control plane field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_group_name: Option<String>,
}

sanitize_entity!(KonnectMeta as "konnect" { control_plane_name, runtime_group_name });

/// Document-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// Tags every entity of the document is expected to carry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select_tags: Vec<String>,
    /// Remaining settings, e.g. entity defaults.
    #[serde(flatten)]
    pub extra: Extra,
}

sanitize_entity!(Info as "info" { select_tags, extra });

impl Content {
    /// Every schema the document's dynamic configurations depend on, in document order.
    ///
    /// Covers plugins wherever they are nested, consumer-group plugin overrides, partials
    /// and vaults.
    pub fn schema_targets(&self) -> IndexSet<SchemaTarget> {
        let service_plugins = self.services.iter().flat_map(|service| {
            let route_plugins = service.routes.iter().flat_map(|route| &route.plugins);
            service.plugins.iter().chain(route_plugins)
        });
        let route_plugins = self.routes.iter().flat_map(|route| &route.plugins);
        let consumer_plugins = self.consumers.iter().flat_map(|consumer| &consumer.plugins);

        let plugins = self
            .plugins
            .iter()
            .chain(service_plugins)
            .chain(route_plugins)
            .chain(consumer_plugins)
            .filter_map(Plugin::schema_target);
        let group_plugins = self
            .consumer_groups
            .iter()
            .flat_map(|group| &group.plugins)
            .filter_map(|plugin| plugin.schema_target());
        let partials = self.partials.iter().filter_map(Partial::schema_target);
        let vaults = self.vaults.iter().filter_map(Vault::schema_target);

        plugins
            .chain(group_plugins)
            .chain(partials)
            .chain(vaults)
            .collect()
    }
}

/// First error raised by a collection worker.
///
/// Recording an error cancels the other workers. A real failure takes precedence over the
/// cancellations it causes.
struct FirstFailure<'run> {
    token: &'run CancellationToken,
    error: Mutex<Option<SanitizeError>>,
}

impl<'run> FirstFailure<'run> {
    fn new(token: &'run CancellationToken) -> Self {
        Self {
            token,
            error: Mutex::new(None),
        }
    }

    fn record<T>(&self, result: Result<T, SanitizeError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                let mut first = self.error.lock().unwrap_or_else(PoisonError::into_inner);
                let replace = match first.as_ref() {
                    None => true,
                    Some(SanitizeError::Cancelled) => !matches!(error, SanitizeError::Cancelled),
                    Some(_) => false,
                };
                if replace {
                    debug!(%error, "collection worker failed, cancelling the others");
                    *first = Some(error);
                }
                self.token.cancel();
                None
            }
        }
    }

    fn finish(self) -> Result<(), SanitizeError> {
        match self.error.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn join<T>(handle: ScopedJoinHandle<'_, Option<T>>) -> Option<T> {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Top-level collections are sanitized in parallel, one scoped thread per collection.
impl Sanitize for Content {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let parent = scope.enter(EntityType::Root)?.walker();
        let run = parent.cancellation.child_token();
        let walker = Walker {
            cancellation: &run,
            ..parent
        };
        let root = Scope::new(walker, EntityType::Root);
        let failure = FirstFailure::new(&run);

        macro_rules! collections {
            ($($field:ident),+ $(,)?) => {{
                let ($($field,)+) = thread::scope(|threads| {
                    $(
                        let $field = threads.spawn(|| {
                            failure.record(root.field(stringify!($field), &self.$field))
                        });
                    )+
                    ($(join($field),)+)
                });
                failure.finish()?;
                ($($field.ok_or(SanitizeError::Cancelled)?,)+)
            }};
        }

        let (
            services,
            routes,
            plugins,
            consumers,
            consumer_groups,
            upstreams,
            certificates,
            snis,
            ca_certificates,
            keys,
            key_sets,
            vaults,
            partials,
        ) = collections!(
            services,
            routes,
            plugins,
            consumers,
            consumer_groups,
            upstreams,
            certificates,
            snis,
            ca_certificates,
            keys,
            key_sets,
            vaults,
            partials,
        );

        Ok(Self {
            format_version: root.field("_format_version", &self.format_version)?,
            transform: root.field("_transform", &self.transform)?,
            workspace: root.field("_workspace", &self.workspace)?,
            konnect: root.field("_konnect", &self.konnect)?,
            info: root.field("_info", &self.info)?,
            services,
            routes,
            plugins,
            consumers,
            consumer_groups,
            upstreams,
            certificates,
            snis,
            ca_certificates,
            keys,
            key_sets,
            vaults,
            partials,
            extra: root.field("extra", &self.extra)?,
        })
    }
}
