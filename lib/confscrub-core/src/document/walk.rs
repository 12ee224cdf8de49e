//! The [`Sanitize`] visitor and the scopes it runs in.

use std::collections::BTreeMap;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialForge;
use crate::error::SanitizeError;
use crate::exemption::{EntityType, ExemptionCache};
use crate::value::ValueSanitizer;

/// Everything a run shares between its workers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Walker<'run> {
    pub(crate) values: &'run ValueSanitizer,
    pub(crate) exemptions: &'run ExemptionCache,
    pub(crate) forge: &'run CredentialForge,
    pub(crate) cancellation: &'run CancellationToken,
}

/// The entity a value is visited in.
///
/// Exemptions are looked up against the scope's entity type, so a field is exempt based
/// on the type that declares it, wherever that type is nested.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'run> {
    walker: Walker<'run>,
    entity: EntityType,
}

impl<'run> Scope<'run> {
    pub(crate) fn new(walker: Walker<'run>, entity: EntityType) -> Self {
        Self { walker, entity }
    }

    /// Opens the scope of a nested entity.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::Cancelled`] once the run has been cancelled.
    pub(crate) fn enter(&self, entity: EntityType) -> Result<Self, SanitizeError> {
        if self.walker.cancellation.is_cancelled() {
            return Err(SanitizeError::Cancelled);
        }
        Ok(Self::new(self.walker, entity))
    }

    pub(crate) fn walker(&self) -> Walker<'run> {
        self.walker
    }

    pub(crate) fn values(&self) -> &'run ValueSanitizer {
        self.walker.values
    }

    pub(crate) fn forge(&self) -> &'run CredentialForge {
        self.walker.forge
    }

    /// Returns `true` when `field` of the current entity is exempt.
    pub(crate) fn skips(&self, field: &str) -> bool {
        self.walker.exemptions.should_skip(&self.entity, field)
    }

    /// Sanitizes the value of `field`, or copies it when the field is exempt.
    pub(crate) fn field<T>(&self, field: &str, value: &T) -> Result<T, SanitizeError>
    where
        T: Sanitize + Clone,
    {
        if self.skips(field) {
            Ok(value.clone())
        } else {
            value.sanitize(self)
        }
    }

    /// Hashes a raw string; empty strings are kept.
    pub(crate) fn string(&self, raw: &str) -> String {
        if raw.is_empty() {
            String::new()
        } else {
            self.walker.values.sanitize(raw)
        }
    }
}

/// A value that can produce a sanitized copy of itself.
pub(crate) trait Sanitize: Sized {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError>;
}

/// Implements [`Sanitize`] for a struct by visiting every field in the scope of `$entity`.
///
/// The generated impl builds the output with a struct literal, so adding a field to the
/// struct without listing it here does not compile. A field serialized under another name
/// is written `field as "name"`, the name being what exemptions are matched against.
macro_rules! sanitize_entity {
    ($ty:ident as $entity:literal { $($field:ident $(as $name:literal)?),+ $(,)? }) => {
        impl $crate::document::walk::Sanitize for $ty {
            fn sanitize(
                &self,
                scope: &$crate::document::walk::Scope<'_>,
            ) -> Result<Self, $crate::error::SanitizeError> {
                let scope = scope.enter($crate::exemption::EntityType::Core($entity))?;
                Ok(Self {
                    $(
                        $field: scope.field(
                            $crate::document::walk::sanitize_entity!(@name $field $($name)?),
                            &self.$field,
                        )?,
                    )+
                })
            }
        }
    };
    (@name $field:ident $name:literal) => {
        $name
    };
    (@name $field:ident) => {
        stringify!($field)
    };
}

pub(crate) use sanitize_entity;

impl Sanitize for String {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        Ok(scope.string(self))
    }
}

impl<T> Sanitize for Option<T>
where
    T: Sanitize,
{
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        self.as_ref().map(|value| value.sanitize(scope)).transpose()
    }
}

impl<T> Sanitize for Vec<T>
where
    T: Sanitize,
{
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        self.iter().map(|value| value.sanitize(scope)).collect()
    }
}

// keys are header names
impl<T> Sanitize for BTreeMap<String, T>
where
    T: Sanitize,
{
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        self.iter()
            .map(|(key, value)| Ok::<_, SanitizeError>((key.clone(), value.sanitize(scope)?)))
            .collect()
    }
}

macro_rules! passthrough {
    ($($ty:ty),+) => {
        $(
            impl Sanitize for $ty {
                fn sanitize(&self, _scope: &Scope<'_>) -> Result<Self, SanitizeError> {
                    Ok(*self)
                }
            }
        )+
    };
}

passthrough!(bool, u8, u16, u32, u64, i32, i64, f64);

/// Arbitrary JSON: strings are hashed, object keys are checked against the scope's
/// exemptions at every depth, other scalars are kept.
impl Sanitize for Value {
    fn sanitize(&self, scope: &Scope<'_>) -> Result<Self, SanitizeError> {
        let sanitized = match self {
            Self::String(raw) => Self::String(scope.string(raw)),
            Self::Array(items) => Self::Array(items.sanitize(scope)?),
            Self::Object(fields) => Self::Object(sanitize_fields(scope, fields)?),
            Self::Null | Self::Bool(_) | Self::Number(_) => self.clone(),
        };
        Ok(sanitized)
    }
}

/// Sanitizes the values of a key-value bag, keys are kept.
pub(crate) fn sanitize_fields<'a, I, M>(scope: &Scope<'_>, fields: I) -> Result<M, SanitizeError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
    M: FromIterator<(String, Value)>,
{
    fields
        .into_iter()
        .map(|(key, value)| Ok::<_, SanitizeError>((key.clone(), scope.field(key, value)?)))
        .collect()
}
