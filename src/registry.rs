use crate::*;

/// Indexed, read-only view over the dependencies of one class
#[derive(Clone, Debug)]
pub struct InjectableRegistry {
    class: String,
    dependencies: Vec<ClassInjectable>,
    scope: Option<Scope>,
    matching: MetadataMatch,
}

impl InjectableRegistry {
    pub fn new(class: impl Into<String>, dependencies: Vec<ClassInjectable>) -> Self {
        Self {
            class: class.into(),
            dependencies,
            scope: None,
            matching: MetadataMatch::default(),
        }
    }

    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_matching(mut self, matching: MetadataMatch) -> Self {
        self.matching = matching;
        self
    }

    /// First dependency with this identifier (and compatible metadata for tokens)
    pub fn resolve(
        &self,
        identifier: &Identifier,
        metadata: Option<&IdentifierMetadata>,
    ) -> Option<&ClassInjectable> {
        self.dependencies.iter().find(|dep| {
            &dep.identifier == identifier
                && self
                    .matching
                    .matches(identifier, metadata, dep.metadata.as_ref())
        })
    }

    /// All dependencies: constructor parameters in order, then properties
    pub fn list(&self) -> &[ClassInjectable] {
        &self.dependencies
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn matching(&self) -> MetadataMatch {
        self.matching
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Dependency-injection framework adapter
pub trait DependencyAdapter: Send + Sync {
    /// Discover the dependencies of a class
    fn inspect(&self, class: &ClassRef) -> Result<InjectableRegistry, WiringError>;

    /// Metadata equality used wherever identifiers are matched
    fn matching(&self) -> MetadataMatch {
        MetadataMatch::default()
    }
}

/// Adapter pairing a [MetadataReader] with the [DependencyReflector]
pub struct ReflectingAdapter<R> {
    reflector: DependencyReflector<R>,
    matching: MetadataMatch,
}

impl<R: MetadataReader> ReflectingAdapter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reflector: DependencyReflector::new(reader),
            matching: MetadataMatch::default(),
        }
    }

    pub fn with_matching(mut self, matching: MetadataMatch) -> Self {
        self.matching = matching;
        self
    }
}

impl Default for ReflectingAdapter<DeclaredMetadata> {
    fn default() -> Self {
        Self::new(DeclaredMetadata::new())
    }
}

impl<R: MetadataReader> DependencyAdapter for ReflectingAdapter<R> {
    fn inspect(&self, class: &ClassRef) -> Result<InjectableRegistry, WiringError> {
        let metadata = self.reflector.reader().read(class)?;
        let dependencies = self.reflector.reflect_metadata(class, &metadata)?;
        Ok(InjectableRegistry::new(class.implementation().name(), dependencies)
            .with_scope(metadata.scope)
            .with_matching(self.matching))
    }

    fn matching(&self) -> MetadataMatch {
        self.matching
    }
}
