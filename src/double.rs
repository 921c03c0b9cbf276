//! Test doubles: call-recording stubs, dynamic mocks and the adapter producing them.
//!
//! A [Mock] is a bag of named members. Members supplied through a [Partial] are
//! kept as given; any other member is completed on first access with an inert
//! [Stub] or a nested auto-mock. The [Shape] trait (usually derived with the
//! [double!](crate::double!) macro) turns a mock into the trait object the class
//! under test expects.

use std::any::{type_name, Any};
use std::collections::hash_map::HashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::*;

type Fake = Arc<dyn Fn(&[String]) -> Instance + Send + Sync>;

#[derive(Clone, Default)]
enum Behavior {
    #[default]
    Inert,
    Returns(Instance),
    Fake(Fake),
}

#[derive(Default)]
struct StubState {
    behavior: Behavior,
    calls: Vec<Vec<String>>,
}

/// Call-recording function stand-in. Clones share behaviour and call history.
#[derive(Clone, Default)]
pub struct Stub(Arc<Mutex<StubState>>);

impl Stub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `value` on every call
    pub fn returns<T: Any + Send + Sync>(self, value: T) -> Self {
        self.0.lock().behavior = Behavior::Returns(Instance::new(value));
        self
    }

    /// Compute the return value from the recorded arguments
    pub fn calls_fake<T, F>(self, fake: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[String]) -> T + Send + Sync + 'static,
    {
        self.0.lock().behavior = Behavior::Fake(Arc::new(move |args: &[String]| Instance::new(fake(args))));
        self
    }

    /// Record a call and produce its return value
    pub fn call(&self, args: Vec<String>) -> Returned {
        let behavior = {
            let mut state = self.0.lock();
            state.calls.push(args.clone());
            state.behavior.clone()
        };
        // fakes run outside the lock so they may call back into the stub
        match behavior {
            Behavior::Inert => Returned::new(None),
            Behavior::Returns(value) => Returned::new(Some(value)),
            Behavior::Fake(fake) => Returned::new(Some(fake(&args))),
        }
    }

    /// Arguments of every recorded call, rendered with `Debug`
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.0.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.0.lock().calls.len()
    }

    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    /// Forget recorded calls, keep behaviour
    pub fn reset(&self) {
        self.0.lock().calls.clear();
    }

    pub fn ptr_eq(&self, other: &Stub) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stub({} calls)", self.call_count())
    }
}

/// Return value of a stubbed call
pub struct Returned {
    member: Option<String>,
    value: Option<Instance>,
}

impl Returned {
    fn new(value: Option<Instance>) -> Self {
        Self {
            member: None,
            value,
        }
    }

    fn of(mut self, member: &str) -> Self {
        self.member = Some(member.to_string());
        self
    }

    /// The configured value, or `R::default()` for a stub that was never configured.
    ///
    /// # Panics
    ///
    /// When the configured value is not an `R`, e.g. a `&str` returned where a
    /// `String` is expected.
    pub fn into_value<R: Any + Clone + Default>(self) -> R {
        let Some(value) = self.value else {
            return R::default();
        };
        match value.downcast::<R>() {
            Some(returned) => returned,
            None => panic!(
                "{} should return {} but was configured with {}",
                self.member
                    .map_or_else(|| "stub".to_string(), |m| format!("member '{}'", m)),
                type_name::<R>(),
                value.type_name()
            ),
        }
    }

    pub fn into_instance(self) -> Option<Instance> {
        self.value
    }
}

/// A member of a mock
#[derive(Clone, Debug)]
pub enum Member {
    Stub(Stub),
    Value(Instance),
    Nested(Arc<Mock>),
}

impl Member {
    fn kind(&self) -> &'static str {
        match self {
            Member::Stub(_) => "stub",
            Member::Value(_) => "value",
            Member::Nested(_) => "nested mock",
        }
    }
}

/// Partial implementation of a double
#[derive(Clone, Debug, Default)]
pub struct Partial {
    members: BTreeMap<String, PartialMember>,
}

#[derive(Clone, Debug)]
enum PartialMember {
    Member(Member),
    Nested(Partial),
}

impl Partial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(mut self, name: impl Into<String>, stub: Stub) -> Self {
        self.members
            .insert(name.into(), PartialMember::Member(Member::Stub(stub)));
        self
    }

    pub fn value<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.members.insert(
            name.into(),
            PartialMember::Member(Member::Value(Instance::new(value))),
        );
        self
    }

    pub fn nested(mut self, name: impl Into<String>, partial: Partial) -> Self {
        self.members
            .insert(name.into(), PartialMember::Nested(partial));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Dynamic double completing unknown members on access
pub struct Mock {
    name: String,
    members: Mutex<HashMap<String, Member>>,
}

impl Mock {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::from_partial(name, Partial::default())
    }

    /// Keep the supplied members as they are, complete the rest lazily
    pub fn from_partial(name: impl Into<String>, partial: Partial) -> Arc<Self> {
        let name = name.into();
        let members = partial
            .members
            .into_iter()
            .map(|(key, member)| {
                let member = match member {
                    PartialMember::Member(m) => m,
                    PartialMember::Nested(p) => {
                        Member::Nested(Mock::from_partial(format!("{}.{}", name, key), p))
                    }
                };
                (key, member)
            })
            .collect();
        Arc::new(Self {
            name,
            members: Mutex::new(members),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stub behind a member, created inert if the member is absent.
    ///
    /// # Panics
    ///
    /// When the member was supplied as a value or a nested mock.
    pub fn stub(&self, member: &str) -> Stub {
        let mut members = self.members.lock();
        match members
            .entry(member.to_string())
            .or_insert_with(|| Member::Stub(Stub::new()))
        {
            Member::Stub(stub) => stub.clone(),
            other => panic!("{}.{} is a {}, not a stub", self.name, member, other.kind()),
        }
    }

    /// Nested mock behind a member, auto-mocked if the member is absent.
    ///
    /// # Panics
    ///
    /// When the member was supplied as a stub or a value.
    pub fn nested(&self, member: &str) -> Arc<Mock> {
        let mut members = self.members.lock();
        match members
            .entry(member.to_string())
            .or_insert_with(|| Member::Nested(Mock::new(format!("{}.{}", self.name, member))))
        {
            Member::Nested(nested) => nested.clone(),
            other => panic!("{}.{} is a {}, not a nested mock", self.name, member, other.kind()),
        }
    }

    /// Plain value supplied for a member
    pub fn value(&self, member: &str) -> Option<Instance> {
        match self.members.lock().get(member) {
            Some(Member::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Replace a member, typically to reconfigure a double after compilation
    pub fn set(&self, member: impl Into<String>, value: Member) {
        self.members.lock().insert(member.into(), value);
    }

    /// Call a member: stubs are called, values and nested mocks are returned as-is
    pub fn invoke(&self, member: &str, args: Vec<String>) -> Returned {
        let existing = self.members.lock().get(member).cloned();
        let returned = match existing {
            Some(Member::Stub(stub)) => stub.call(args),
            Some(Member::Value(value)) => Returned::new(Some(value)),
            Some(Member::Nested(nested)) => Returned::new(Some(Instance::new(nested))),
            None => self.stub(member).call(args),
        };
        returned.of(member)
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.lock().contains_key(member)
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut members: Vec<String> = self.members.lock().keys().cloned().collect();
        members.sort();
        f.debug_struct("Mock")
            .field("name", &self.name)
            .field("members", &members)
            .finish()
    }
}

/// Wrap a [Mock] into the interface expected by the class under test
pub trait Shape {
    type Target: ?Sized + Send + Sync + 'static;

    fn shape(mock: Arc<Mock>) -> Arc<Self::Target>;
}

/// A produced double: the mock to assert on and the instance handed to the constructor
#[derive(Clone, Debug)]
pub struct Double {
    mock: Arc<Mock>,
    instance: Instance,
}

impl Double {
    pub fn new(mock: Arc<Mock>, instance: Instance) -> Self {
        Self { mock, instance }
    }

    /// Untyped double: the bare mock is the instance
    pub fn bare(mock: Arc<Mock>) -> Self {
        let instance = Instance::new(mock.clone());
        Self { mock, instance }
    }

    pub fn mock(&self) -> &Arc<Mock> {
        &self.mock
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

/// Mocking library adapter
pub trait DoublesAdapter: Send + Sync {
    /// Double for a dependency, completing `partial` when given
    fn mock(&self, injectable: &ClassInjectable, partial: Option<Partial>) -> Double;

    fn stub(&self) -> Stub;
}

type ShapeFn = Arc<dyn Fn(Arc<Mock>) -> Instance + Send + Sync>;

/// Built-in doubles adapter backed by [Mock]
#[derive(Clone, Default)]
pub struct Doubles {
    shapes: HashMap<Identifier, ShapeFn>,
}

impl Doubles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the shape generated for a trait
    pub fn with<S: Shape + 'static>(self) -> Self {
        self.shape::<S::Target>(S::shape)
    }

    /// Shape doubles of class `T` with a custom wrapper
    pub fn shape<T>(self, shape: impl Fn(Arc<Mock>) -> Arc<T> + Send + Sync + 'static) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.shape_for(Identifier::of::<T>(), shape)
    }

    /// Shape doubles injected under a token
    pub fn shape_for<T>(
        mut self,
        identifier: impl Into<Identifier>,
        shape: impl Fn(Arc<Mock>) -> Arc<T> + Send + Sync + 'static,
    ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.shapes.insert(
            identifier.into(),
            Arc::new(move |mock| Instance::new(shape(mock))),
        );
        self
    }

    fn shape_of(&self, injectable: &ClassInjectable) -> Option<&ShapeFn> {
        self.shapes.get(&injectable.identifier).or_else(|| {
            injectable
                .value
                .class()
                .and_then(|class| self.shapes.get(&Identifier::Class(class.clone())))
        })
    }
}

impl DoublesAdapter for Doubles {
    fn mock(&self, injectable: &ClassInjectable, partial: Option<Partial>) -> Double {
        let mock = Mock::from_partial(
            injectable.identifier.to_string(),
            partial.unwrap_or_default(),
        );
        match self.shape_of(injectable) {
            Some(shape) => {
                let instance = shape(mock.clone());
                Double::new(mock, instance)
            }
            None => Double::bare(mock),
        }
    }

    fn stub(&self) -> Stub {
        Stub::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self, name: &str) -> String;
        fn count(&self) -> u32;
    }

    double! {
        GreeterDouble: dyn Greeter {
            fn greet(&self, name: &str) -> String;
            fn count(&self) -> u32;
        }
    }

    fn injectable<T: ?Sized + 'static>() -> ClassInjectable {
        DependencyReflector::new(DeclaredMetadata::new())
            .reflect_metadata(
                &ClassRef::of::<()>(),
                &ClassMetadata::new().param(ClassRef::of::<T>()),
            )
            .unwrap()
            .remove(0)
    }

    #[test]
    fn stubs_record_calls_and_return_values() {
        let stub = Stub::new().returns(5u32);
        assert_eq!(stub.call(vec!["1".into()]).into_value::<u32>(), 5);
        assert_eq!(stub.call(vec![]).into_value::<u32>(), 5);
        assert_eq!(stub.calls(), vec![vec!["1".to_string()], vec![]]);
        stub.reset();
        assert!(!stub.called());

        // only an unconfigured stub falls back to the default
        assert_eq!(Stub::new().call(vec![]).into_value::<String>(), "");
    }

    #[test]
    #[should_panic(expected = "stub should return alloc::string::String but was configured with &str")]
    fn mistyped_return_values_are_reported() {
        Stub::new().returns("x").call(vec![]).into_value::<String>();
    }

    #[test]
    fn fakes_see_the_arguments() {
        let stub = Stub::new().calls_fake(|args| args.join("+"));
        assert_eq!(
            stub.call(vec!["a".into(), "b".into()]).into_value::<String>(),
            "a+b"
        );
    }

    #[test]
    fn mocks_complete_missing_members() {
        let mock = Mock::from_partial(
            "svc",
            Partial::new()
                .stub("known", Stub::new().returns(1u8))
                .value("limit", 10usize)
                .nested("inner", Partial::new().value("depth", 2u8)),
        );
        assert_eq!(mock.invoke("known", vec![]).into_value::<u8>(), 1);
        assert_eq!(mock.invoke("unknown", vec![]).into_value::<u8>(), 0);
        assert_eq!(mock.stub("unknown").call_count(), 1);
        assert_eq!(mock.invoke("limit", vec![]).into_value::<usize>(), 10);
        assert_eq!(mock.nested("inner").value("depth").unwrap().cast::<u8>().unwrap(), 2);

        let auto = mock.nested("auto");
        assert_eq!(auto.name(), "svc.auto");
        assert!(Arc::ptr_eq(&auto, &mock.nested("auto")));
    }

    #[test]
    fn supplied_members_are_never_replaced() {
        let mock = Mock::from_partial(
            "svc",
            Partial::new()
                .value("limit", 10usize)
                .nested("inner", Partial::new().value("depth", 2u8)),
        );
        let inner = mock.nested("inner");

        assert_eq!(mock.invoke("limit", vec![]).into_value::<usize>(), 10);
        let invoked = mock.invoke("inner", vec![]).into_instance().unwrap();
        assert!(Arc::ptr_eq(&invoked.cast::<Arc<Mock>>().unwrap(), &inner));
        assert!(!mock.stub("other").called());

        assert_eq!(mock.value("limit").unwrap().cast::<usize>().unwrap(), 10);
        assert_eq!(inner.value("depth").unwrap().cast::<u8>().unwrap(), 2);
        assert!(Arc::ptr_eq(&inner, &mock.nested("inner")));
    }

    #[test]
    #[should_panic(expected = "svc.limit is a value, not a stub")]
    fn values_cannot_be_stubbed() {
        let mock = Mock::from_partial("svc", Partial::new().value("limit", 10usize));
        mock.stub("limit");
    }

    #[test]
    #[should_panic(expected = "svc.inner is a nested mock, not a stub")]
    fn nested_mocks_cannot_be_stubbed() {
        let mock = Mock::from_partial("svc", Partial::new().nested("inner", Partial::new()));
        mock.stub("inner");
    }

    #[test]
    #[should_panic(expected = "svc.known is a stub, not a nested mock")]
    fn stubs_cannot_be_nested() {
        let mock = Mock::from_partial("svc", Partial::new().stub("known", Stub::new()));
        mock.nested("known");
    }

    #[test]
    #[should_panic(expected = "member 'limit' should return u8 but was configured with usize")]
    fn mistyped_values_name_the_member() {
        let mock = Mock::from_partial("svc", Partial::new().value("limit", 10usize));
        mock.invoke("limit", vec![]).into_value::<u8>();
    }

    #[test]
    fn shaped_doubles_forward_to_the_mock() {
        let doubles = Doubles::new().with::<GreeterDouble>();
        let partial = Partial::new().stub("greet", Stub::new().calls_fake(|args| format!("hi {}", args[0])));
        let double = doubles.mock(&injectable::<dyn Greeter>(), Some(partial));

        let greeter = double.instance().cast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet("bob"), "hi \"bob\"");
        assert_eq!(greeter.count(), 0);
        assert_eq!(double.mock().stub("greet").calls(), vec![vec!["\"bob\"".to_string()]]);
        assert_eq!(double.mock().stub("count").call_count(), 1);
    }

    #[test]
    fn unshaped_doubles_are_bare_mocks() {
        let double = Doubles::new().mock(&injectable::<dyn Greeter>(), None);
        let mock = double.instance().cast::<Arc<Mock>>().unwrap();
        assert!(Arc::ptr_eq(&mock, double.mock()));
    }
}
