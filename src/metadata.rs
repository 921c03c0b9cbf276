//! Raw injection metadata, as declared by a class.
//!
//! These records stand in for the decorator metadata of reflective DI frameworks:
//! a positional list of reflected parameter types, a sparse list of injection
//! tokens attached to parameter indexes, and injected properties.
//! A [MetadataReader] is the per-framework adapter that produces them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::*;

/// Type reflected for a parameter or property
#[derive(Clone, Debug)]
pub enum ReflectedType {
    Class(ClassRef),
    /// Ambiguous placeholder: the real type was erased (interfaces, unions)
    Object,
    /// Collection type, ambiguous without a token
    Array,
    /// Nothing could be reflected
    Undefined,
}

impl From<ClassRef> for ReflectedType {
    fn from(class: ClassRef) -> Self {
        ReflectedType::Class(class)
    }
}

/// Deferred token, resolved when the class is reflected
#[derive(Clone)]
pub struct LazyRef(Arc<dyn Fn() -> Option<RawToken> + Send + Sync>);

impl LazyRef {
    pub fn new(resolver: impl Fn() -> Option<RawToken> + Send + Sync + 'static) -> Self {
        Self(Arc::new(resolver))
    }

    pub fn resolve(&self) -> Option<RawToken> {
        (self.0)()
    }
}

impl fmt::Debug for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyRef")
    }
}

/// Injection token as written in the metadata, possibly still wrapped in a [LazyRef]
#[derive(Clone, Debug)]
pub enum RawToken {
    Class(ClassRef),
    Name(String),
    Symbol(Symbol),
    Lazy(LazyRef),
}

impl RawToken {
    /// Forward reference to a class that may not be declarable yet
    pub fn forward(resolver: impl Fn() -> Option<RawToken> + Send + Sync + 'static) -> Self {
        RawToken::Lazy(LazyRef::new(resolver))
    }
}

impl From<&str> for RawToken {
    fn from(name: &str) -> Self {
        RawToken::Name(name.to_string())
    }
}

impl From<String> for RawToken {
    fn from(name: String) -> Self {
        RawToken::Name(name)
    }
}

impl From<Symbol> for RawToken {
    fn from(symbol: Symbol) -> Self {
        RawToken::Symbol(symbol)
    }
}

impl From<ClassRef> for RawToken {
    fn from(class: ClassRef) -> Self {
        RawToken::Class(class)
    }
}

impl From<LazyRef> for RawToken {
    fn from(lazy: LazyRef) -> Self {
        RawToken::Lazy(lazy)
    }
}

/// Resolution qualifiers, reported on the injectable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub optional: bool,
    pub self_only: bool,
    pub skip_self: bool,
    pub host: bool,
}

/// Lifetime declared by the class. Reported, never enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Singleton,
    Request,
    Transient,
}

/// An explicit injection: the token plus everything attached to it
#[derive(Clone, Debug)]
pub struct InjectDecl {
    pub token: RawToken,
    pub metadata: Option<IdentifierMetadata>,
    pub multi: bool,
    pub qualifiers: Qualifiers,
}

impl InjectDecl {
    pub fn new(token: impl Into<RawToken>) -> Self {
        Self {
            token: token.into(),
            metadata: None,
            multi: false,
            qualifiers: Qualifiers::default(),
        }
    }

    /// Bind every provider of the token at once
    pub fn multi(token: impl Into<RawToken>) -> Self {
        Self {
            multi: true,
            ..Self::new(token)
        }
    }

    pub fn with_metadata(mut self, metadata: IdentifierMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn named(self, name: impl Into<Value>) -> Self {
        self.tagged("name", name)
    }

    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let metadata = self.metadata.take().unwrap_or_default();
        self.metadata = Some(metadata.with(key, value));
        self
    }

    pub fn optional(mut self) -> Self {
        self.qualifiers.optional = true;
        self
    }

    pub fn self_only(mut self) -> Self {
        self.qualifiers.self_only = true;
        self
    }

    pub fn skip_self(mut self) -> Self {
        self.qualifiers.skip_self = true;
        self
    }

    pub fn host(mut self) -> Self {
        self.qualifiers.host = true;
        self
    }
}

macro_rules! inject_decl_from {
    ($($token:ty),*) => {
        $(
        impl From<$token> for InjectDecl {
            fn from(token: $token) -> Self {
                InjectDecl::new(token)
            }
        }
        )*
    };
}

inject_decl_from!(&str, String, Symbol, ClassRef, LazyRef, RawToken);

/// An injected property
#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub key: String,
    pub reflected: ReflectedType,
    pub inject: Option<InjectDecl>,
}

/// Everything a class declares about its dependencies
#[derive(Clone, Debug, Default)]
pub struct ClassMetadata {
    pub params: Vec<ReflectedType>,
    pub tokens: Vec<(usize, InjectDecl)>,
    pub properties: Vec<PropertyDecl>,
    pub scope: Option<Scope>,
}

impl ClassMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the reflected type of the next constructor parameter
    pub fn param(mut self, reflected: impl Into<ReflectedType>) -> Self {
        self.params.push(reflected.into());
        self
    }

    /// Attach an injection token to a constructor parameter
    pub fn inject(mut self, index: usize, decl: impl Into<InjectDecl>) -> Self {
        self.tokens.push((index, decl.into()));
        self
    }

    /// Property injected by its reflected type
    pub fn property(mut self, key: impl Into<String>, reflected: impl Into<ReflectedType>) -> Self {
        self.properties.push(PropertyDecl {
            key: key.into(),
            reflected: reflected.into(),
            inject: None,
        });
        self
    }

    /// Property injected through an explicit token
    pub fn inject_property(
        mut self,
        key: impl Into<String>,
        reflected: impl Into<ReflectedType>,
        decl: impl Into<InjectDecl>,
    ) -> Self {
        self.properties.push(PropertyDecl {
            key: key.into(),
            reflected: reflected.into(),
            inject: Some(decl.into()),
        });
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Number of constructor parameters, including tokens declared past the reflected types
    pub fn arity(&self) -> usize {
        self.tokens
            .iter()
            .map(|(index, _)| index.saturating_add(1))
            .fold(self.params.len(), usize::max)
    }

    /// Token attached to a parameter; the last declaration wins
    pub fn token_at(&self, index: usize) -> Option<&InjectDecl> {
        self.tokens
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, decl)| decl)
    }

    pub fn reflected_at(&self, index: usize) -> &ReflectedType {
        self.params.get(index).unwrap_or(&ReflectedType::Undefined)
    }
}

/// Per-framework adapter reading the raw metadata of a class
pub trait MetadataReader: Send + Sync {
    fn read(&self, class: &ClassRef) -> Result<ClassMetadata, WiringError>;

    /// Frameworks without property injection ignore declared properties
    fn supports_properties(&self) -> bool {
        true
    }
}

/// Reads the metadata declared through [Injectable::metadata]
#[derive(Clone, Copy, Debug)]
pub struct DeclaredMetadata {
    properties: bool,
}

impl DeclaredMetadata {
    pub fn new() -> Self {
        Self { properties: true }
    }

    /// Flavour for frameworks that only inject through constructors
    pub fn constructor_only() -> Self {
        Self { properties: false }
    }
}

impl Default for DeclaredMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataReader for DeclaredMetadata {
    fn read(&self, class: &ClassRef) -> Result<ClassMetadata, WiringError> {
        class
            .factory()
            .map(|factory| factory.metadata())
            .ok_or_else(|| WiringError::NotInjectable { class: class.name() })
    }

    fn supports_properties(&self) -> bool {
        self.properties
    }
}
