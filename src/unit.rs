use std::any::Any;
use std::sync::Arc;

use crate::resolve::Resolved;
use crate::*;

/// Lookup of the doubles created while compiling a unit.
///
/// Identifiers are matched like in the registry: classes ignore metadata, tokens
/// follow the adapter's [MetadataMatch] policy.
pub struct UnitReference {
    entries: IdentifierMap<Resolved>,
}

impl UnitReference {
    pub(crate) fn new(entries: IdentifierMap<Resolved>) -> Self {
        Self { entries }
    }

    /// Mock behind a dependency, to configure or assert on
    pub fn get(&self, identifier: impl Into<Identifier>) -> Result<Arc<Mock>, WiringError> {
        self.lookup(&identifier.into(), None)
            .map(|double| double.mock().clone())
    }

    pub fn get_with(
        &self,
        identifier: impl Into<Identifier>,
        metadata: &IdentifierMetadata,
    ) -> Result<Arc<Mock>, WiringError> {
        self.lookup(&identifier.into(), Some(metadata))
            .map(|double| double.mock().clone())
    }

    /// The double exactly as the unit received it, e.g. an `Arc<dyn Trait>`
    pub fn get_as<T: Any + Clone>(&self, identifier: impl Into<Identifier>) -> Result<T, WiringError> {
        self.lookup(&identifier.into(), None)?.instance().cast()
    }

    pub fn get_as_with<T: Any + Clone>(
        &self,
        identifier: impl Into<Identifier>,
        metadata: &IdentifierMetadata,
    ) -> Result<T, WiringError> {
        self.lookup(&identifier.into(), Some(metadata))?
            .instance()
            .cast()
    }

    /// Whether a retrievable double exists for the dependency
    pub fn contains(&self, identifier: impl Into<Identifier>) -> bool {
        matches!(
            self.entries.get(&identifier.into(), None),
            Some(Resolved::Mocked(_))
        )
    }

    fn lookup(
        &self,
        identifier: &Identifier,
        metadata: Option<&IdentifierMetadata>,
    ) -> Result<&Double, WiringError> {
        match self.entries.get(identifier, metadata) {
            Some(Resolved::Mocked(double)) => Ok(double),
            Some(Resolved::Final(_)) => Err(WiringError::FinalDependency {
                identifier: identifier.to_string(),
            }),
            Some(Resolved::Exposed(_)) => Err(WiringError::ExposedDependency {
                identifier: identifier.to_string(),
            }),
            None => Err(WiringError::IdentifierNotFound {
                identifier: identifier.to_string(),
            }),
        }
    }
}

/// A constructed unit and the lookup over its doubles
pub struct CompiledUnit<T> {
    pub unit: T,
    pub unit_ref: UnitReference,
}

impl<T> CompiledUnit<T> {
    pub fn into_parts(self) -> (T, UnitReference) {
        (self.unit, self.unit_ref)
    }
}
