//! Dependency-injection aware unit test harness.
//!
//! Given a class declaring its dependencies, the harness reflects the full
//! dependency list, creates a call-recording double for each dependency, applies
//! the overrides configured by the test and constructs the class under test.
//! The doubles stay reachable through a [UnitReference].
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use unitwire::*;
//! // A dependency and its double
//! trait Repository: Send + Sync {
//!     fn find(&self, id: u32) -> String;
//! }
//!
//! double! {
//!     RepositoryDouble: dyn Repository {
//!         fn find(&self, id: u32) -> String;
//!     }
//! }
//!
//! // The class under test declares its constructor dependencies
//! struct Service {
//!     repository: Arc<dyn Repository>,
//! }
//!
//! impl Injectable for Service {
//!     fn metadata() -> ClassMetadata {
//!         ClassMetadata::new().param(ClassRef::of::<dyn Repository>())
//!     }
//!
//!     fn construct(args: &mut Arguments) -> Result<Self, WiringError> {
//!         Ok(Service { repository: args.next()? })
//!     }
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! let harness = Harness::new(
//!     ReflectingAdapter::default(),
//!     Doubles::new().with::<RepositoryDouble>(),
//! );
//! let CompiledUnit { unit, unit_ref } = harness
//!     .solitary::<Service>()
//!     .mock(Identifier::of::<dyn Repository>())
//!     .impl_with(|stub| Partial::new().stub("find", stub().returns("alice".to_string())))
//!     .compile()?;
//!
//! assert_eq!(unit.repository.find(1), "alice");
//! assert_eq!(unit_ref.get(Identifier::of::<dyn Repository>())?.stub("find").call_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * A [DependencyAdapter] inspects a class into an [InjectableRegistry]. The built-in
//!   [ReflectingAdapter] reads raw [ClassMetadata] with a [MetadataReader] and normalizes
//!   it with the [DependencyReflector]: tokens are resolved, lazy references unwrapped,
//!   erased types without a token rejected.
//! * A [DoublesAdapter] produces a [Double] for any dependency. The built-in [Doubles]
//!   adapter creates [Mock]s and shapes them into trait objects registered through [Shape].
//! * [SolitaryBuilder] doubles every dependency; [SociableBuilder] builds exposed classes
//!   (or everything inside the declared boundaries) for real. Both are consumed by
//!   `compile`, which returns a [CompiledUnit].

mod adapters;
mod builder;
mod double;
mod helpers;
mod identifier;
mod inject;
mod metadata;
mod reflect;
mod registry;
mod resolve;
mod unit;

pub use adapters::{
    install_dependency_adapter, install_doubles_adapter, sociable, solitary, AdapterRegistry,
};
pub use builder::{MockOverride, SociableBuilder, SolitaryBuilder};
pub use double::{Double, Doubles, DoublesAdapter, Member, Mock, Partial, Returned, Shape, Stub};
pub use identifier::{
    ClassId, ClassRef, Identifier, IdentifierMap, IdentifierMetadata, MetadataMatch, Symbol,
};
pub use inject::{build, Arguments, ClassFactory, Harness, Injectable, Instance};
pub use metadata::{
    ClassMetadata, DeclaredMetadata, InjectDecl, LazyRef, MetadataReader, PropertyDecl,
    Qualifiers, RawToken, ReflectedType, Scope,
};
pub use reflect::{ClassInjectable, DependencyReflector, InjectionKind, ReflectedValue};
pub use registry::{DependencyAdapter, InjectableRegistry, ReflectingAdapter};
pub use resolve::WiringError;
pub use unit::{CompiledUnit, UnitReference};
