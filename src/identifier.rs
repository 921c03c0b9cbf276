//! Identifiers naming a dependency: class references, string tokens and symbol tokens.
//!
//! Class identifiers are compared through their [TypeId] and never carry metadata.
//! Token identifiers may carry an [IdentifierMetadata] record used to tell apart
//! several bindings sharing the same token; how that record takes part in equality
//! is decided by a [MetadataMatch] policy.

use std::any::{type_name, TypeId};
use std::collections::hash_map::{Entry, HashMap};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;

use crate::inject::{ClassFactory, Injectable, InjectableFactory};

/// Runtime identity of a class (a concrete struct or a `dyn Trait` interface)
#[derive(Clone, Copy)]
pub struct ClassId {
    id: TypeId,
    name: &'static str,
}

impl ClassId {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Type name without module paths, used in error messages
    pub fn name(&self) -> String {
        short_name(self.name)
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Strip module paths from a type name, keeping generic arguments readable.
fn short_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or_default());
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or_default());
    out
}

/// A class value: its identity, and the means to build it when it is not abstract.
///
/// Two references to the same class are equal whether or not they can be instantiated.
#[derive(Clone)]
pub struct ClassRef {
    id: ClassId,
    factory: Option<Arc<dyn ClassFactory>>,
}

impl ClassRef {
    /// Abstract reference: the class can be named and doubled, never instantiated
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: ClassId::of::<T>(),
            factory: None,
        }
    }

    /// Reference to an injectable class, instantiated as `Arc<T>`
    pub fn injectable<T: Injectable>() -> Self {
        Self {
            id: ClassId::of::<T>(),
            factory: Some(Arc::new(InjectableFactory::<T, T>::new(|c| c))),
        }
    }

    /// Reference to the interface `I`, instantiated by building `C` and upcasting it
    pub fn implemented_by<I, C>(upcast: fn(Arc<C>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable,
    {
        Self {
            id: ClassId::of::<I>(),
            factory: Some(Arc::new(InjectableFactory::<C, I>::new(upcast))),
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> String {
        self.id.name()
    }

    /// Class built for this reference: the implementation behind an interface
    pub fn implementation(&self) -> ClassId {
        self.factory.as_ref().map_or(self.id, |factory| factory.class())
    }

    pub fn factory(&self) -> Option<&Arc<dyn ClassFactory>> {
        self.factory.as_ref()
    }

    pub fn is_instantiable(&self) -> bool {
        self.factory.is_some()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.id, f)
    }
}

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);
static SYMBOL_REGISTRY: Lazy<Mutex<HashMap<String, Symbol>>> = Lazy::new(Mutex::default);

/// Unique token, equal only to itself (and its clones)
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInner>);

struct SymbolInner {
    id: u64,
    description: String,
}

impl Symbol {
    /// Create a fresh symbol. Two calls with the same description yield distinct symbols.
    pub fn new(description: impl Into<String>) -> Self {
        Symbol(Arc::new(SymbolInner {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }))
    }

    /// Shared symbol for a key, created on first use
    pub fn for_key(key: &str) -> Self {
        SYMBOL_REGISTRY
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Symbol::new(key))
            .clone()
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0.description)
    }
}

/// Name of a dependency
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Class(ClassRef),
    Token(String),
    Symbol(Symbol),
}

impl Identifier {
    /// Class identifier for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Identifier::Class(ClassRef::of::<T>())
    }

    /// String and symbol identifiers are tokens
    pub fn is_token(&self) -> bool {
        !matches!(self, Identifier::Class(_))
    }

    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            Identifier::Class(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Class(c) => write!(f, "{}", c.name()),
            Identifier::Token(t) => write!(f, "'{}'", t),
            Identifier::Symbol(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Identifier {
    fn from(token: &str) -> Self {
        Identifier::Token(token.to_string())
    }
}

impl From<String> for Identifier {
    fn from(token: String) -> Self {
        Identifier::Token(token)
    }
}

impl From<Symbol> for Identifier {
    fn from(symbol: Symbol) -> Self {
        Identifier::Symbol(symbol)
    }
}

impl From<&Symbol> for Identifier {
    fn from(symbol: &Symbol) -> Self {
        Identifier::Symbol(symbol.clone())
    }
}

impl From<ClassRef> for Identifier {
    fn from(class: ClassRef) -> Self {
        Identifier::Class(class)
    }
}

impl From<ClassId> for Identifier {
    fn from(id: ClassId) -> Self {
        Identifier::Class(ClassRef { id, factory: None })
    }
}

/// Framework-defined record attached to a token (qualifier, name, tags)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierMetadata(BTreeMap<String, Value>);

impl IdentifierMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Named binding, stored under the `name` key
    pub fn named(value: impl Into<Value>) -> Self {
        Self::new().with("name", value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How metadata takes part in matching token identifiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetadataMatch {
    /// Metadata both absent, or deep-equal
    #[default]
    Exact,
    /// Metadata never distinguishes two lookups of the same token
    Ignore,
}

impl MetadataMatch {
    pub fn matches(
        self,
        identifier: &Identifier,
        wanted: Option<&IdentifierMetadata>,
        actual: Option<&IdentifierMetadata>,
    ) -> bool {
        if !identifier.is_token() {
            return true;
        }
        match self {
            MetadataMatch::Exact => wanted == actual,
            MetadataMatch::Ignore => true,
        }
    }
}

/// Values keyed by identifier and optional metadata, matched with a [MetadataMatch] policy
pub struct IdentifierMap<V> {
    entries: HashMap<Identifier, Vec<(Option<IdentifierMetadata>, V)>>,
    matching: MetadataMatch,
}

impl<V> IdentifierMap<V> {
    pub fn new(matching: MetadataMatch) -> Self {
        Self {
            entries: HashMap::new(),
            matching,
        }
    }

    pub fn matching(&self) -> MetadataMatch {
        self.matching
    }

    fn position(
        &self,
        identifier: &Identifier,
        metadata: Option<&IdentifierMetadata>,
    ) -> Option<usize> {
        self.entries.get(identifier)?.iter().position(|(m, _)| {
            self.matching
                .matches(identifier, metadata, m.as_ref())
        })
    }

    pub fn get(&self, identifier: &Identifier, metadata: Option<&IdentifierMetadata>) -> Option<&V> {
        let idx = self.position(identifier, metadata)?;
        self.entries.get(identifier).map(|bucket| &bucket[idx].1)
    }

    /// Store a value, replacing any matching entry
    pub fn insert(
        &mut self,
        identifier: Identifier,
        metadata: Option<IdentifierMetadata>,
        value: V,
    ) -> Option<V> {
        // class identifiers never carry metadata
        let metadata = if identifier.is_token() { metadata } else { None };
        match self.position(&identifier, metadata.as_ref()) {
            Some(idx) => {
                let bucket = self.entries.get_mut(&identifier)?;
                Some(std::mem::replace(&mut bucket[idx], (metadata, value)).1)
            }
            None => {
                self.entries
                    .entry(identifier)
                    .or_default()
                    .push((metadata, value));
                None
            }
        }
    }

    pub fn remove(&mut self, identifier: &Identifier, metadata: Option<&IdentifierMetadata>) -> Option<V> {
        let idx = self.position(identifier, metadata)?;
        let Entry::Occupied(mut bucket) = self.entries.entry(identifier.clone()) else {
            return None;
        };
        let (_, value) = bucket.get_mut().remove(idx);
        if bucket.get().is_empty() {
            bucket.remove();
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, Option<&IdentifierMetadata>, &V)> {
        self.entries
            .iter()
            .flat_map(|(id, bucket)| bucket.iter().map(move |(m, v)| (id, m.as_ref(), v)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for IdentifierMap<V> {
    fn default() -> Self {
        Self::new(MetadataMatch::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    trait Port: Send + Sync {}
    struct Adapter;

    #[test]
    fn class_names_are_short() {
        assert_eq!(ClassId::of::<Adapter>().name(), "Adapter");
        assert_eq!(ClassId::of::<dyn Port>().name(), "dyn Port");
        assert_eq!(ClassId::of::<Vec<Adapter>>().name(), "Vec<Adapter>");
    }

    #[test]
    fn symbols_are_unique_unless_registered() {
        let a = Symbol::new("db");
        let b = Symbol::new("db");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(Symbol::for_key("shared-db"), Symbol::for_key("shared-db"));
    }

    #[test]
    fn class_identifiers_ignore_abstractness() {
        let abstract_ref: Identifier = ClassRef::of::<Adapter>().into();
        assert_eq!(abstract_ref, Identifier::of::<Adapter>());
        assert_ne!(Identifier::of::<Adapter>(), Identifier::of::<dyn Port>());
    }

    #[test]
    fn implementations_are_named_after_the_built_class() {
        struct Plain;
        impl Port for Plain {}
        impl Injectable for Plain {
            fn metadata() -> crate::ClassMetadata {
                crate::ClassMetadata::new()
            }

            fn construct(_args: &mut crate::Arguments) -> Result<Self, crate::WiringError> {
                Ok(Plain)
            }
        }

        let class = ClassRef::implemented_by::<dyn Port, Plain>(|p| p);
        assert_eq!(class.name(), "dyn Port");
        assert_eq!(class.implementation().name(), "Plain");
        assert_eq!(ClassRef::of::<dyn Port>().implementation().name(), "dyn Port");
    }

    #[rstest]
    #[case(None, None, true)]
    #[case(Some(IdentifierMetadata::named("a")), None, false)]
    #[case(None, Some(IdentifierMetadata::named("a")), false)]
    #[case(Some(IdentifierMetadata::named("a")), Some(IdentifierMetadata::named("a")), true)]
    #[case(Some(IdentifierMetadata::named("a")), Some(IdentifierMetadata::named("b")), false)]
    fn exact_metadata_match(
        #[case] wanted: Option<IdentifierMetadata>,
        #[case] actual: Option<IdentifierMetadata>,
        #[case] expected: bool,
    ) {
        let token = Identifier::from("TOKEN");
        assert_eq!(
            MetadataMatch::Exact.matches(&token, wanted.as_ref(), actual.as_ref()),
            expected
        );
        // classes never compare metadata
        assert!(MetadataMatch::Exact.matches(
            &Identifier::of::<Adapter>(),
            wanted.as_ref(),
            actual.as_ref()
        ));
    }

    #[test]
    fn map_replaces_matching_entries() {
        let mut map = IdentifierMap::new(MetadataMatch::Exact);
        let primary = IdentifierMetadata::named("primary");
        assert!(map.insert("DB".into(), None, 1).is_none());
        assert!(map.insert("DB".into(), Some(primary.clone()), 2).is_none());
        assert_eq!(map.insert("DB".into(), None, 3), Some(1));

        assert_eq!(map.get(&"DB".into(), None), Some(&3));
        assert_eq!(map.get(&"DB".into(), Some(&primary)), Some(&2));
        assert_eq!(map.len(), 2);

        assert_eq!(map.remove(&"DB".into(), Some(&primary)), Some(2));
        assert_eq!(map.get(&"DB".into(), Some(&primary)), None);
    }

    #[test]
    fn map_drops_metadata_on_classes() {
        let mut map = IdentifierMap::new(MetadataMatch::Exact);
        map.insert(
            Identifier::of::<Adapter>(),
            Some(IdentifierMetadata::named("ignored")),
            "adapter",
        );
        assert_eq!(map.get(&Identifier::of::<Adapter>(), None), Some(&"adapter"));
    }
}
