//! Configuration of a unit before compilation.
//!
//! Builders are values: each configuration call consumes the builder and returns
//! the next one, and `compile` consumes it for good.

use std::any::Any;
use std::collections::HashSet;
use std::marker::PhantomData;

use crate::resolve::Resolver;
use crate::*;

/// Builds the partial implementation of a double from the adapter's stub factory
pub(crate) type ImplFn = Box<dyn FnOnce(&dyn Fn() -> Stub) -> Partial>;

pub(crate) enum Override {
    Impl(ImplFn),
    Final(Instance),
    FinalPartial(Partial),
}

/// Everything configured on a builder
pub(crate) struct Plan {
    /// In registration order, later entries replace earlier ones
    pub overrides: Vec<(Identifier, Option<IdentifierMetadata>, Override)>,
    pub sociable: bool,
    pub exposed: HashSet<ClassId>,
    /// Set once boundaries were declared: every other buildable class is real
    pub boundaries: Option<HashSet<ClassId>>,
    pub fail_fast: bool,
}

impl Plan {
    fn new(sociable: bool) -> Self {
        Self {
            overrides: Vec::new(),
            sociable,
            exposed: HashSet::new(),
            boundaries: None,
            fail_fast: true,
        }
    }
}

/// Pending override for one dependency, completed by `impl_with` or a final value
pub struct MockOverride<B> {
    builder: B,
    identifier: Identifier,
    metadata: Option<IdentifierMetadata>,
    attach: fn(&mut B) -> &mut Plan,
}

impl<B> MockOverride<B> {
    fn finish(mut self, value: Override) -> B {
        (self.attach)(&mut self.builder)
            .overrides
            .push((self.identifier, self.metadata, value));
        self.builder
    }

    /// Retrievable double completed from a partial implementation.
    ///
    /// The closure receives the stub factory of the doubles adapter.
    pub fn impl_with<F>(self, build: F) -> B
    where
        F: FnOnce(&dyn Fn() -> Stub) -> Partial + 'static,
    {
        self.finish(Override::Impl(Box::new(build)))
    }

    /// Use `value` as-is. The dependency cannot be retrieved from the unit reference.
    pub fn final_value<V: Any + Send + Sync>(self, value: V) -> B {
        self.finish(Override::Final(Instance::new(value)))
    }

    /// Double built from a partial, frozen like a final value
    pub fn final_partial(self, partial: Partial) -> B {
        self.finish(Override::FinalPartial(partial))
    }
}

/// Builder for a unit whose dependencies are all doubled
pub struct SolitaryBuilder<T> {
    harness: Result<Harness, WiringError>,
    plan: Plan,
    _unit: PhantomData<fn() -> T>,
}

impl<T: Injectable> SolitaryBuilder<T> {
    pub(crate) fn new(harness: Result<Harness, WiringError>) -> Self {
        Self {
            harness,
            plan: Plan::new(false),
            _unit: PhantomData,
        }
    }

    fn plan(&mut self) -> &mut Plan {
        &mut self.plan
    }

    /// Override a dependency. A later override of the same identifier replaces this one.
    pub fn mock(self, identifier: impl Into<Identifier>) -> MockOverride<Self> {
        MockOverride {
            builder: self,
            identifier: identifier.into(),
            metadata: None,
            attach: Self::plan,
        }
    }

    /// Override the binding of a token qualified by `metadata`
    pub fn mock_with(
        self,
        identifier: impl Into<Identifier>,
        metadata: IdentifierMetadata,
    ) -> MockOverride<Self> {
        MockOverride {
            builder: self,
            identifier: identifier.into(),
            metadata: Some(metadata),
            attach: Self::plan,
        }
    }

    /// Reflect the unit, double its dependencies and construct it
    pub fn compile(self) -> Result<CompiledUnit<T>, WiringError> {
        let harness = self.harness?;
        Resolver::new(&harness, self.plan).compile()
    }
}

/// Builder for a unit built with some real collaborators
pub struct SociableBuilder<T> {
    harness: Result<Harness, WiringError>,
    plan: Plan,
    _unit: PhantomData<fn() -> T>,
}

impl<T: Injectable> SociableBuilder<T> {
    pub(crate) fn new(harness: Result<Harness, WiringError>) -> Self {
        Self {
            harness,
            plan: Plan::new(true),
            _unit: PhantomData,
        }
    }

    fn plan(&mut self) -> &mut Plan {
        &mut self.plan
    }

    /// Override a dependency anywhere in the graph
    pub fn mock(self, identifier: impl Into<Identifier>) -> MockOverride<Self> {
        MockOverride {
            builder: self,
            identifier: identifier.into(),
            metadata: None,
            attach: Self::plan,
        }
    }

    pub fn mock_with(
        self,
        identifier: impl Into<Identifier>,
        metadata: IdentifierMetadata,
    ) -> MockOverride<Self> {
        MockOverride {
            builder: self,
            identifier: identifier.into(),
            metadata: Some(metadata),
            attach: Self::plan,
        }
    }

    /// Build the class `C` for real wherever it is injected
    pub fn expose<C: ?Sized + 'static>(self) -> Self {
        self.expose_class(ClassId::of::<C>())
    }

    pub fn expose_class(mut self, class: ClassId) -> Self {
        self.plan.exposed.insert(class);
        self
    }

    /// Keep these classes doubled and build every other buildable class for real
    pub fn boundaries(mut self, classes: impl IntoIterator<Item = ClassId>) -> Self {
        self.plan
            .boundaries
            .get_or_insert_with(HashSet::new)
            .extend(classes);
        self
    }

    /// Double unconfigured dependencies instead of failing
    pub fn disable_fail_fast(mut self) -> Self {
        self.plan.fail_fast = false;
        self
    }

    pub fn compile(self) -> Result<CompiledUnit<T>, WiringError> {
        let harness = self.harness?;
        Resolver::new(&harness, self.plan).compile()
    }
}
