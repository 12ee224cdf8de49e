//! Decides which fields are never sanitized.
//!
//! An exemption applies to the field's whole value. Four layers are consulted, first match
//! wins:
//!
//! 1. root-field exemptions: document metadata such as `_format_version`
//! 2. static per-entity-type exemptions, e.g. a plugin's `name` or a route's `methods`
//! 3. the `id` key, anywhere inside a configuration bag
//! 4. schema-derived exemptions: configuration fields whose schema declares an enumerated
//!    domain

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::schema::{EntitySchema, SchemaTarget};

mod inference;
mod tables;

use self::inference::{enumerated_fields, normalize};
use self::tables::{CONFIG_ID_KEY, ROOT_EXEMPTIONS, STATIC_EXEMPTIONS};

/// Logical type of the value that owns a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// The document root.
    Root,
    /// A typed entity, named after its collection (e.g. `routes`).
    Core(&'static str),
    /// The dynamic configuration of a plugin, partial or vault.
    ///
    /// `None` when the owner does not name its schema (e.g. a plugin without a name).
    Config(Option<SchemaTarget>),
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "document"),
            Self::Core(name) => write!(f, "{name}"),
            Self::Config(Some(target)) => write!(f, "{target}.config"),
            Self::Config(None) => write!(f, "config"),
        }
    }
}

#[derive(Debug, Clone)]
enum Derived {
    Fields(Arc<HashSet<String>>),
    // schema lookup failed, static layers only
    Unavailable,
}

/// Per-context cache of exemption decisions.
///
/// Schema-derived exemptions are computed once per target and read concurrently afterwards.
#[derive(Debug, Default)]
pub struct ExemptionCache {
    derived: RwLock<HashMap<SchemaTarget, Derived>>,
}

impl ExemptionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `field` of `entity` must be kept as-is.
    pub fn should_skip(&self, entity: &EntityType, field: &str) -> bool {
        match entity {
            EntityType::Root => ROOT_EXEMPTIONS.contains(field),
            EntityType::Core(name) => STATIC_EXEMPTIONS
                .get(name)
                .is_some_and(|fields| fields.contains(field)),
            EntityType::Config(target) => {
                field == CONFIG_ID_KEY
                    || target
                        .as_ref()
                        .is_some_and(|target| self.derived_skip(target, field))
            }
        }
    }

    /// Derives and stores the exemptions of `target` from its schema.
    ///
    /// A target is only ever warmed once; later calls are ignored.
    pub fn warm(&self, target: SchemaTarget, schema: &EntitySchema) {
        let mut derived = self.derived.write().unwrap_or_else(PoisonError::into_inner);
        derived.entry(target).or_insert_with_key(|target| {
            let fields = enumerated_fields(schema);
            debug!(%target, exempt = fields.len(), "schema exemptions derived");
            Derived::Fields(Arc::new(fields))
        });
    }

    /// Records that no schema could be obtained for `target`.
    pub fn mark_unavailable(&self, target: SchemaTarget) {
        self.derived
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target)
            .or_insert(Derived::Unavailable);
    }

    /// Returns `true` once `target` has been warmed or marked unavailable.
    pub fn is_warm(&self, target: &SchemaTarget) -> bool {
        self.derived
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    fn derived_skip(&self, target: &SchemaTarget, field: &str) -> bool {
        let derived = self.derived.read().unwrap_or_else(PoisonError::into_inner);
        match derived.get(target) {
            Some(Derived::Fields(fields)) => fields.contains(&normalize(field)),
            Some(Derived::Unavailable) | None => false,
        }
    }
}
