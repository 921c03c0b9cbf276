//! Normalization of raw metadata into the canonical dependency list.

use tracing::trace;

use crate::*;

/// Upper bound on nested lazy references
const MAX_LAZY_DEPTH: usize = 16;

/// Where a dependency is injected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionKind {
    Param,
    Property,
}

/// Value reflected for a dependency, used to shape its double
#[derive(Clone, Debug, PartialEq)]
pub enum ReflectedValue {
    Class(ClassRef),
    Symbol(Symbol),
    /// Ambiguous placeholder kept alongside a string token
    Object,
    /// Marker for multi-injection
    Array,
    /// Nothing usable could be reflected (`UndefinedDependency`)
    Undefined,
}

impl ReflectedValue {
    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            ReflectedValue::Class(c) => Some(c),
            _ => None,
        }
    }
}

/// One discovered dependency of a class
#[derive(Clone, Debug)]
pub struct ClassInjectable {
    pub identifier: Identifier,
    pub value: ReflectedValue,
    pub kind: InjectionKind,
    pub metadata: Option<IdentifierMetadata>,
    pub property_key: Option<String>,
    pub qualifiers: Qualifiers,
}

impl ClassInjectable {
    fn param(identifier: Identifier, value: ReflectedValue) -> Self {
        Self {
            identifier,
            value,
            kind: InjectionKind::Param,
            metadata: None,
            property_key: None,
            qualifiers: Qualifiers::default(),
        }
    }

    fn with_decl(mut self, decl: &InjectDecl) -> Self {
        // class identifiers never carry metadata
        if self.identifier.is_token() {
            self.metadata = decl.metadata.clone();
        }
        self.qualifiers = decl.qualifiers;
        self
    }
}

/// Location of a dependency within its class, for error reporting
enum Location<'a> {
    Param(usize),
    Property(&'a str),
}

impl Location<'_> {
    fn describe(&self) -> String {
        match self {
            Location::Param(index) => format!("parameter at index [{}]", index),
            Location::Property(key) => format!("property '{}'", key),
        }
    }
}

/// Turns the raw metadata read by `R` into an ordered list of [ClassInjectable].
///
/// Constructor parameters come first, in order, then properties in declaration order.
pub struct DependencyReflector<R> {
    reader: R,
}

impl<R: MetadataReader> DependencyReflector<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reflect(&self, class: &ClassRef) -> Result<Vec<ClassInjectable>, WiringError> {
        let metadata = self.reader.read(class)?;
        self.reflect_metadata(class, &metadata)
    }

    pub fn reflect_metadata(
        &self,
        class: &ClassRef,
        metadata: &ClassMetadata,
    ) -> Result<Vec<ClassInjectable>, WiringError> {
        let name = class.implementation().name();
        let mut dependencies = Vec::new();

        for index in 0..metadata.arity() {
            let reflected = metadata.reflected_at(index);
            let location = Location::Param(index);
            let injectable = match metadata.token_at(index) {
                Some(decl) => with_token(&name, &location, reflected, decl)?,
                None => without_token(reflected).ok_or(WiringError::MissingToken {
                    class: name.clone(),
                    index,
                })?,
            };
            trace!(class = %name, index, identifier = %injectable.identifier, "reflected constructor dependency");
            dependencies.push(injectable);
        }

        if self.reader.supports_properties() {
            for property in &metadata.properties {
                let location = Location::Property(&property.key);
                let injectable = match &property.inject {
                    Some(decl) => with_token(&name, &location, &property.reflected, decl)?,
                    None => without_token(&property.reflected).ok_or_else(|| {
                        WiringError::MissingPropertyToken {
                            class: name.clone(),
                            key: property.key.clone(),
                        }
                    })?,
                };
                trace!(class = %name, key = %property.key, identifier = %injectable.identifier, "reflected property dependency");
                dependencies.push(ClassInjectable {
                    kind: InjectionKind::Property,
                    property_key: Some(property.key.clone()),
                    ..injectable
                });
            }
        }

        Ok(dependencies)
    }
}

/// Dependency declared through an explicit token
fn with_token(
    class: &str,
    location: &Location,
    reflected: &ReflectedType,
    decl: &InjectDecl,
) -> Result<ClassInjectable, WiringError> {
    let identifier = resolve_token(class, location, &decl.token)?;

    let value = if decl.multi {
        ReflectedValue::Array
    } else {
        match (reflected, &identifier) {
            // erased type: the token itself is the best description we have
            (ReflectedType::Object, Identifier::Class(token)) => ReflectedValue::Class(token.clone()),
            (ReflectedType::Object, Identifier::Symbol(token)) => ReflectedValue::Symbol(token.clone()),
            (ReflectedType::Object, Identifier::Token(_)) => ReflectedValue::Object,
            (ReflectedType::Class(c), _) => ReflectedValue::Class(c.clone()),
            (ReflectedType::Array, _) => ReflectedValue::Array,
            (ReflectedType::Undefined, _) => ReflectedValue::Undefined,
        }
    };

    Ok(ClassInjectable::param(identifier, value).with_decl(decl))
}

/// Dependency identified by its reflected type alone
fn without_token(reflected: &ReflectedType) -> Option<ClassInjectable> {
    match reflected {
        ReflectedType::Class(c) => Some(ClassInjectable::param(
            Identifier::Class(c.clone()),
            ReflectedValue::Class(c.clone()),
        )),
        _ => None,
    }
}

/// Unwrap lazy references down to a flat identifier
fn resolve_token(class: &str, location: &Location, token: &RawToken) -> Result<Identifier, WiringError> {
    let mut current = token.clone();
    for _ in 0..MAX_LAZY_DEPTH {
        current = match current {
            RawToken::Class(c) => return Ok(Identifier::Class(c)),
            RawToken::Name(n) => return Ok(Identifier::Token(n)),
            RawToken::Symbol(s) => return Ok(Identifier::Symbol(s)),
            RawToken::Lazy(lazy) => match lazy.resolve() {
                Some(next) => next,
                None => break,
            },
        };
    }
    Err(WiringError::UnresolvedLazyReference {
        class: class.to_string(),
        location: location.describe(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    trait Repository {}
    trait Clock {}
    struct Mailer;

    fn reflector() -> DependencyReflector<DeclaredMetadata> {
        DependencyReflector::new(DeclaredMetadata::new())
    }

    fn owner() -> ClassRef {
        ClassRef::of::<Mailer>()
    }

    fn summary(deps: &[ClassInjectable]) -> Vec<(String, ReflectedValue, InjectionKind)> {
        deps.iter()
            .map(|d| (d.identifier.to_string(), d.value.clone(), d.kind))
            .collect()
    }

    #[test]
    fn class_parameters_identify_themselves() {
        let meta = ClassMetadata::new()
            .param(ClassRef::of::<dyn Repository>())
            .param(ClassRef::of::<dyn Clock>());
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(
            summary(&deps),
            vec![
                (
                    "dyn Repository".to_string(),
                    ReflectedValue::Class(ClassRef::of::<dyn Repository>()),
                    InjectionKind::Param
                ),
                (
                    "dyn Clock".to_string(),
                    ReflectedValue::Class(ClassRef::of::<dyn Clock>()),
                    InjectionKind::Param
                ),
            ]
        );
    }

    #[test]
    fn token_precedence() {
        let sym = Symbol::new("cache");
        let meta = ClassMetadata::new()
            // string token over an erased type keeps the placeholder value
            .param(ReflectedType::Object)
            .inject(0, "CONFIG")
            // symbol token over an erased type becomes its own value
            .param(ReflectedType::Object)
            .inject(1, sym.clone())
            // class token over an erased type
            .param(ReflectedType::Object)
            .inject(2, ClassRef::of::<dyn Clock>())
            // token over a concrete type keeps the concrete type as value
            .param(ClassRef::of::<dyn Repository>())
            .inject(3, "REPO")
            // token past the reflected list
            .inject(4, "LATE");
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(
            summary(&deps),
            vec![
                ("'CONFIG'".to_string(), ReflectedValue::Object, InjectionKind::Param),
                ("Symbol(cache)".to_string(), ReflectedValue::Symbol(sym), InjectionKind::Param),
                (
                    "dyn Clock".to_string(),
                    ReflectedValue::Class(ClassRef::of::<dyn Clock>()),
                    InjectionKind::Param
                ),
                (
                    "'REPO'".to_string(),
                    ReflectedValue::Class(ClassRef::of::<dyn Repository>()),
                    InjectionKind::Param
                ),
                ("'LATE'".to_string(), ReflectedValue::Undefined, InjectionKind::Param),
            ]
        );
    }

    #[test]
    fn erased_parameter_without_token_is_an_error() {
        let meta = ClassMetadata::new()
            .param(ClassRef::of::<dyn Clock>())
            .param(ReflectedType::Object);
        let err = reflector().reflect_metadata(&owner(), &meta).unwrap_err();
        assert!(matches!(err, WiringError::MissingToken { index: 1, .. }));
        let message = err.to_string();
        assert!(message.contains("Mailer"));
        assert!(message.contains("[1]"));

        let meta = ClassMetadata::new().param(ReflectedType::Undefined);
        assert!(reflector().reflect_metadata(&owner(), &meta).is_err());
    }

    #[test]
    fn oversized_token_index_fails_on_the_first_gap() {
        let meta = ClassMetadata::new().inject(usize::MAX, "TYPO");
        assert_eq!(meta.arity(), usize::MAX);
        assert!(matches!(
            reflector().reflect_metadata(&owner(), &meta),
            Err(WiringError::MissingToken { index: 0, .. })
        ));
    }

    #[test]
    fn lazy_tokens_are_unwrapped() {
        let meta = ClassMetadata::new()
            .param(ReflectedType::Undefined)
            .inject(
                0,
                RawToken::forward(|| {
                    Some(RawToken::forward(|| Some(ClassRef::of::<dyn Clock>().into())))
                }),
            );
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(deps[0].identifier, Identifier::of::<dyn Clock>());
        assert_eq!(deps[0].value, ReflectedValue::Undefined);

        let meta = ClassMetadata::new()
            .param(ReflectedType::Object)
            .inject(0, RawToken::forward(|| None));
        assert!(matches!(
            reflector().reflect_metadata(&owner(), &meta),
            Err(WiringError::UnresolvedLazyReference { .. })
        ));
    }

    #[test]
    fn multi_injection_is_a_single_array_entry() {
        let meta = ClassMetadata::new()
            .param(ReflectedType::Array)
            .inject(0, InjectDecl::multi("PLUGIN").named("http"));
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].value, ReflectedValue::Array);
        assert_eq!(deps[0].metadata, Some(IdentifierMetadata::named("http")));
    }

    #[test]
    fn properties_follow_parameters() {
        let meta = ClassMetadata::new()
            .property("clock", ClassRef::of::<dyn Clock>())
            .param(ClassRef::of::<dyn Repository>())
            .inject_property("flag", ReflectedType::Object, InjectDecl::new("FLAG").optional());
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].kind, InjectionKind::Param);
        assert_eq!(deps[1].property_key.as_deref(), Some("clock"));
        assert_eq!(deps[2].property_key.as_deref(), Some("flag"));
        assert!(deps[2].qualifiers.optional);

        let constructor_only = DependencyReflector::new(DeclaredMetadata::constructor_only());
        assert_eq!(constructor_only.reflect_metadata(&owner(), &meta).unwrap().len(), 1);

        let meta = ClassMetadata::new().property("erased", ReflectedType::Object);
        assert!(matches!(
            reflector().reflect_metadata(&owner(), &meta),
            Err(WiringError::MissingPropertyToken { .. })
        ));
    }

    #[test]
    fn class_tokens_drop_metadata() {
        let meta = ClassMetadata::new()
            .param(ReflectedType::Object)
            .inject(0, InjectDecl::new(ClassRef::of::<dyn Clock>()).named("utc"));
        let deps = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(deps[0].metadata, None);
    }

    #[test]
    fn reflection_is_deterministic() {
        let meta = ClassMetadata::new()
            .param(ClassRef::of::<dyn Repository>())
            .param(ReflectedType::Object)
            .inject(1, "CONFIG");
        let first = reflector().reflect_metadata(&owner(), &meta).unwrap();
        let second = reflector().reflect_metadata(&owner(), &meta).unwrap();
        assert_eq!(summary(&first), summary(&second));
    }

    #[test]
    fn abstract_classes_cannot_be_read() {
        assert!(matches!(
            reflector().reflect(&ClassRef::of::<dyn Clock>()),
            Err(WiringError::NotInjectable { .. })
        ));
    }
}
