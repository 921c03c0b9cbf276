use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::*;

/// Type-erased value handed to a constructor: a double, a real collaborator or a final value.
///
/// Clones share the same allocation, which gives identifier-level identity to doubles.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Clone the stored value out if it has type `T`
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Same as [Instance::downcast], failing with [WiringError::TypeMismatch]
    pub fn cast<T: Any + Clone>(&self) -> Result<T, WiringError> {
        self.downcast().ok_or(WiringError::TypeMismatch {
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance<{}>", self.type_name)
    }
}

/// A class that can be wired by the harness.
///
/// The metadata plays the role of injection decorators: it lists the constructor
/// parameters and injected properties. Constructor arguments arrive in the
/// declared order; properties are assigned once the instance exists.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Declared dependencies
    fn metadata() -> ClassMetadata;

    /// Build an instance from its positional dependencies
    fn construct(args: &mut Arguments) -> Result<Self, WiringError>;

    /// Assign an injected property
    fn inject_property(&mut self, key: &str, _value: Instance) -> Result<(), WiringError> {
        Err(WiringError::UnknownProperty {
            class: ClassId::of::<Self>().name(),
            key: key.to_string(),
        })
    }
}

/// Object-safe view of a class that can describe and build itself
pub trait ClassFactory: Send + Sync {
    /// Class actually constructed
    fn class(&self) -> ClassId;

    fn metadata(&self) -> ClassMetadata;

    fn instantiate(
        &self,
        args: Arguments,
        properties: Vec<(String, Instance)>,
    ) -> Result<Instance, WiringError>;
}

/// Build an `Injectable` class and hand it out behind an `Arc` of its interface
pub(crate) struct InjectableFactory<C, I: ?Sized> {
    upcast: fn(Arc<C>) -> Arc<I>,
    _class: PhantomData<fn() -> C>,
}

impl<C, I: ?Sized> InjectableFactory<C, I> {
    pub fn new(upcast: fn(Arc<C>) -> Arc<I>) -> Self {
        Self {
            upcast,
            _class: PhantomData,
        }
    }
}

impl<C, I> ClassFactory for InjectableFactory<C, I>
where
    C: Injectable,
    I: ?Sized + Send + Sync + 'static,
{
    fn class(&self) -> ClassId {
        ClassId::of::<C>()
    }

    fn metadata(&self) -> ClassMetadata {
        C::metadata()
    }

    fn instantiate(
        &self,
        args: Arguments,
        properties: Vec<(String, Instance)>,
    ) -> Result<Instance, WiringError> {
        let concrete: C = build(args, properties)?;
        Ok(Instance::new((self.upcast)(Arc::new(concrete))))
    }
}

/// Construct a class then assign its properties in order
pub fn build<T: Injectable>(
    mut args: Arguments,
    properties: Vec<(String, Instance)>,
) -> Result<T, WiringError> {
    let mut instance = T::construct(&mut args)?;
    for (key, value) in properties {
        instance.inject_property(&key, value)?;
    }
    Ok(instance)
}

/// Positional constructor arguments
pub struct Arguments {
    class: String,
    values: std::vec::IntoIter<Instance>,
    index: usize,
}

impl Arguments {
    pub fn new(class: impl Into<String>, values: Vec<Instance>) -> Self {
        Self {
            class: class.into(),
            values: values.into_iter(),
            index: 0,
        }
    }

    /// Take the next argument as a `T`
    pub fn next<T: Any + Clone>(&mut self) -> Result<T, WiringError> {
        let index = self.index;
        let value = self.next_instance()?;
        value.downcast().ok_or_else(|| WiringError::ArgumentMismatch {
            class: self.class.clone(),
            index,
            expected: type_name::<T>(),
            found: value.type_name(),
        })
    }

    /// Take the next argument without looking at its type
    pub fn next_instance(&mut self) -> Result<Instance, WiringError> {
        let index = self.index;
        let value = self.values.next().ok_or_else(|| WiringError::MissingArgument {
            class: self.class.clone(),
            index,
        })?;
        self.index += 1;
        Ok(value)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Entry point of the harness: a dependency-injection adapter paired with a doubles adapter.
///
/// The adapters are passed in explicitly; [AdapterRegistry] offers detection on top of this.
#[derive(Clone)]
pub struct Harness {
    dependencies: Arc<dyn DependencyAdapter>,
    doubles: Arc<dyn DoublesAdapter>,
}

impl Harness {
    pub fn new(
        dependencies: impl DependencyAdapter + 'static,
        doubles: impl DoublesAdapter + 'static,
    ) -> Self {
        Self::from_shared(Arc::new(dependencies), Arc::new(doubles))
    }

    pub fn from_shared(
        dependencies: Arc<dyn DependencyAdapter>,
        doubles: Arc<dyn DoublesAdapter>,
    ) -> Self {
        Self {
            dependencies,
            doubles,
        }
    }

    pub fn dependencies(&self) -> &dyn DependencyAdapter {
        self.dependencies.as_ref()
    }

    pub fn doubles(&self) -> &dyn DoublesAdapter {
        self.doubles.as_ref()
    }

    /// Every dependency not overridden is doubled
    pub fn solitary<T: Injectable>(&self) -> SolitaryBuilder<T> {
        SolitaryBuilder::new(Ok(self.clone()))
    }

    /// Selected dependencies are built for real, the others doubled
    pub fn sociable<T: Injectable>(&self) -> SociableBuilder<T> {
        SociableBuilder::new(Ok(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair(u32, String);

    impl Injectable for Pair {
        fn metadata() -> ClassMetadata {
            ClassMetadata::new()
        }

        fn construct(args: &mut Arguments) -> Result<Self, WiringError> {
            Ok(Pair(args.next()?, args.next()?))
        }
    }

    #[test]
    fn arguments_are_positional() {
        let args = Arguments::new("Pair", vec![Instance::new(7u32), Instance::new("x".to_string())]);
        let pair: Pair = build(args, vec![]).unwrap();
        assert_eq!(pair, Pair(7, "x".into()));
    }

    #[test]
    fn argument_type_mismatch_names_the_position() {
        let args = Arguments::new("Pair", vec![Instance::new(7u32), Instance::new(8u32)]);
        let err = build::<Pair>(args, vec![]).unwrap_err();
        assert!(matches!(err, WiringError::ArgumentMismatch { index: 1, .. }));
        assert!(err.to_string().contains("Pair"));
    }

    #[test]
    fn missing_arguments_and_unknown_properties_fail() {
        let args = Arguments::new("Pair", vec![Instance::new(7u32)]);
        assert!(matches!(
            build::<Pair>(args, vec![]),
            Err(WiringError::MissingArgument { index: 1, .. })
        ));

        let args = Arguments::new("Pair", vec![Instance::new(7u32), Instance::new(String::new())]);
        let props = vec![("extra".to_string(), Instance::new(()))];
        assert!(matches!(
            build::<Pair>(args, props),
            Err(WiringError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn instances_keep_identity_across_clones() {
        let a = Instance::new(Arc::new(3u8));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Instance::new(Arc::new(3u8))));
        assert_eq!(*a.cast::<Arc<u8>>().unwrap(), 3);
        assert!(matches!(a.cast::<u8>(), Err(WiringError::TypeMismatch { .. })));
    }
}
