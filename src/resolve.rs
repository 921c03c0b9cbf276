//! Resolution engine: turns a configured builder into a constructed unit.
//!
//! Every dependency of the unit is resolved once per compilation and stored by
//! identifier, so all occurrences of an identifier receive the same double.
//! In sociable mode exposed classes are built recursively with the same rules;
//! built instances are memoized per compilation by class, and a class reached
//! again while it is still being built is reported as a cycle.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::builder::{Override, Plan};
use crate::*;

/// Outcome for one identifier
pub(crate) enum Resolved {
    Mocked(Double),
    Final(Instance),
    Exposed(Instance),
}

impl Resolved {
    pub fn instance(&self) -> &Instance {
        match self {
            Resolved::Mocked(double) => double.instance(),
            Resolved::Final(instance) | Resolved::Exposed(instance) => instance,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Resolving,
    Ready(Instance),
}

pub(crate) struct Resolver<'h> {
    harness: &'h Harness,
    overrides: IdentifierMap<Override>,
    sociable: bool,
    exposed: HashSet<ClassId>,
    boundaries: Option<HashSet<ClassId>>,
    fail_fast: bool,
    resolved: IdentifierMap<Resolved>,
    instances: HashMap<ClassId, Slot>,
    path: Vec<ClassId>,
}

impl<'h> Resolver<'h> {
    pub fn new(harness: &'h Harness, plan: Plan) -> Self {
        let matching = harness.dependencies().matching();
        let mut overrides = IdentifierMap::new(matching);
        for (identifier, metadata, value) in plan.overrides {
            overrides.insert(identifier, metadata, value);
        }
        Self {
            harness,
            overrides,
            sociable: plan.sociable,
            exposed: plan.exposed,
            boundaries: plan.boundaries,
            fail_fast: plan.fail_fast,
            resolved: IdentifierMap::new(matching),
            instances: HashMap::new(),
            path: Vec::new(),
        }
    }

    pub fn compile<T: Injectable>(mut self) -> Result<CompiledUnit<T>, WiringError> {
        let class = ClassRef::injectable::<T>();
        self.path.push(class.id());
        let registry = self.harness.dependencies().inspect(&class)?;
        let (args, properties) = self.wire(&registry)?;
        let unit = build::<T>(args, properties)?;

        for (identifier, metadata, _) in self.overrides.iter() {
            debug!(class = %class.name(), %identifier, ?metadata, "override matched no dependency");
        }
        debug!(class = %class.name(), dependencies = self.resolved.len(), "compiled unit");
        Ok(CompiledUnit {
            unit,
            unit_ref: UnitReference::new(self.resolved),
        })
    }

    /// Resolve every dependency of a class into constructor arguments and properties
    fn wire(
        &mut self,
        registry: &InjectableRegistry,
    ) -> Result<(Arguments, Vec<(String, Instance)>), WiringError> {
        let mut args = Vec::new();
        let mut properties = Vec::new();
        for injectable in registry.list() {
            let instance = self.resolve(injectable, registry.class_name())?;
            match injectable.kind {
                InjectionKind::Param => args.push(instance),
                InjectionKind::Property => {
                    let key = injectable.property_key.clone().unwrap_or_default();
                    properties.push((key, instance));
                }
            }
        }
        Ok((Arguments::new(registry.class_name(), args), properties))
    }

    fn resolve(
        &mut self,
        injectable: &ClassInjectable,
        dependent: &str,
    ) -> Result<Instance, WiringError> {
        let identifier = &injectable.identifier;
        let metadata = injectable.metadata.as_ref();
        if let Some(done) = self.resolved.get(identifier, metadata) {
            return Ok(done.instance().clone());
        }

        let resolved = match self.overrides.remove(identifier, metadata) {
            Some(value) => self.apply(injectable, value),
            None if self.sociable => self.dispose(injectable, dependent)?,
            None => self.double(injectable),
        };
        let instance = resolved.instance().clone();
        self.resolved
            .insert(identifier.clone(), injectable.metadata.clone(), resolved);
        Ok(instance)
    }

    fn apply(&self, injectable: &ClassInjectable, value: Override) -> Resolved {
        let doubles = self.harness.doubles();
        match value {
            Override::Impl(build) => {
                let stub = || doubles.stub();
                let partial = build(&stub);
                debug!(identifier = %injectable.identifier, "mocked with a partial implementation");
                Resolved::Mocked(doubles.mock(injectable, Some(partial)))
            }
            Override::Final(instance) => {
                debug!(identifier = %injectable.identifier, "final value");
                Resolved::Final(instance)
            }
            Override::FinalPartial(partial) => {
                debug!(identifier = %injectable.identifier, "final partial");
                Resolved::Final(doubles.mock(injectable, Some(partial)).instance().clone())
            }
        }
    }

    fn double(&self, injectable: &ClassInjectable) -> Resolved {
        debug!(identifier = %injectable.identifier, "auto-mocked");
        Resolved::Mocked(self.harness.doubles().mock(injectable, None))
    }

    /// Sociable disposition of a dependency without override
    fn dispose(
        &mut self,
        injectable: &ClassInjectable,
        dependent: &str,
    ) -> Result<Resolved, WiringError> {
        // tokens stand for external systems and are always doubled
        let Identifier::Class(class) = &injectable.identifier else {
            return Ok(self.double(injectable));
        };
        let id = class.id();
        if self.boundaries.as_ref().is_some_and(|b| b.contains(&id)) {
            return Ok(self.double(injectable));
        }

        let buildable = injectable
            .value
            .class()
            .filter(|c| c.is_instantiable())
            .or(Some(class).filter(|c| c.is_instantiable()))
            .cloned();

        if self.exposed.contains(&id) {
            let target = buildable.ok_or_else(|| WiringError::NotInjectable { class: class.name() })?;
            debug!(class = %target.implementation(), "exposed");
            return Ok(Resolved::Exposed(self.instantiate(&target)?));
        }
        if self.boundaries.is_some() {
            if let Some(target) = buildable {
                debug!(class = %target.implementation(), "built for real inside boundaries");
                return Ok(Resolved::Exposed(self.instantiate(&target)?));
            }
        }
        if self.fail_fast {
            return Err(WiringError::NotConfigured {
                identifier: injectable.identifier.to_string(),
                dependent: dependent.to_string(),
            });
        }
        Ok(self.double(injectable))
    }

    /// Build a real collaborator, at most once per compilation
    fn instantiate(&mut self, class: &ClassRef) -> Result<Instance, WiringError> {
        let id = class.id();
        match self.instances.get(&id) {
            Some(Slot::Ready(instance)) => return Ok(instance.clone()),
            Some(Slot::Resolving) => {
                let start = self.path.iter().position(|c| *c == id).unwrap_or_default();
                let mut path: Vec<String> = self.path[start..].iter().map(ClassId::name).collect();
                path.push(class.name());
                return Err(WiringError::CyclicExpose { path });
            }
            None => {}
        }
        let factory = class
            .factory()
            .cloned()
            .ok_or_else(|| WiringError::NotInjectable { class: class.name() })?;

        self.instances.insert(id, Slot::Resolving);
        self.path.push(id);
        let registry = self.harness.dependencies().inspect(class)?;
        let (args, properties) = self.wire(&registry)?;
        let instance = factory.instantiate(args, properties)?;
        self.path.pop();
        self.instances.insert(id, Slot::Ready(instance.clone()));
        Ok(instance)
    }
}

/// Errors triggered while reflecting, wiring or inspecting a unit
#[derive(Error, Debug)]
pub enum WiringError {
    #[error("'{class}' is missing a token for the dependency at index [{index}]; declare an injection token (class, string or symbol) for this parameter")]
    MissingToken { class: String, index: usize },
    #[error("'{class}' is missing a token for the property '{key}'; declare an injection token for this property")]
    MissingPropertyToken { class: String, key: String },
    #[error("'{class}' declares a lazy reference for its {location} that resolved to nothing; check that the referenced class or token is declared")]
    UnresolvedLazyReference { class: String, location: String },
    #[error("'{class}' is abstract and cannot be instantiated; declare it with ClassRef::injectable or ClassRef::implemented_by")]
    NotInjectable { class: String },
    #[error("No {kind} adapter found; install one or build the harness with explicit adapters")]
    AdapterNotFound { kind: &'static str },
    #[error("Dependency {identifier} was not found in the unit reference")]
    IdentifierNotFound { identifier: String },
    #[error("Dependency {identifier} was declared with a final value and cannot be retrieved; use impl_with to keep it retrievable")]
    FinalDependency { identifier: String },
    #[error("Dependency {identifier} is a real instance in this sociable unit, not a double")]
    ExposedDependency { identifier: String },
    #[error("Dependency {identifier} of '{dependent}' is not configured: mock it, expose it or declare it as a boundary (or disable fail-fast)")]
    NotConfigured { identifier: String, dependent: String },
    #[error("Cyclic dependencies between real classes: {}", .path.join(" -> "))]
    CyclicExpose { path: Vec<String> },
    #[error("'{class}' expected an argument at index [{index}] but none was provided")]
    MissingArgument { class: String, index: usize },
    #[error("'{class}' received a {found} at index [{index}] instead of {expected}; register a double shape for this dependency")]
    ArgumentMismatch {
        class: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{class}' has no injectable property '{key}'")]
    UnknownProperty { class: String, key: String },
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
