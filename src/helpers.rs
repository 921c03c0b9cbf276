/// Declare a double for a trait: a struct forwarding every method to a [Mock](crate::Mock).
///
/// Arguments are recorded with their `Debug` rendering. Return values come from the
/// member's stub and fall back to `Default` when it was never configured, so every
/// return type must implement `Clone + Default`. A value configured with another
/// type panics.
///
/// ```
/// # use std::sync::Arc;
/// # use unitwire::*;
/// pub trait Clock: Send + Sync {
///     fn now(&self) -> u64;
///     fn sleep(&self, millis: u64);
/// }
///
/// double! {
///     pub ClockDouble: dyn Clock {
///         fn now(&self) -> u64;
///         fn sleep(&self, millis: u64);
///     }
/// }
///
/// let mock = Mock::from_partial("clock", Partial::new().stub("now", Stub::new().returns(42u64)));
/// let clock: Arc<dyn Clock> = <ClockDouble as Shape>::shape(mock.clone());
/// clock.sleep(10);
/// assert_eq!(clock.now(), 42);
/// assert_eq!(mock.stub("sleep").calls(), vec![vec!["10".to_string()]]);
/// ```
#[macro_export]
macro_rules! double {
    ($vis:vis $Double:ident : dyn $Trait:path {
        $( fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?; )*
    }) => {
        #[derive(Clone, Debug)]
        $vis struct $Double(::std::sync::Arc<$crate::Mock>);

        impl $Double {
            #[allow(dead_code)]
            $vis fn mock(&self) -> &::std::sync::Arc<$crate::Mock> {
                &self.0
            }
        }

        impl $crate::Shape for $Double {
            type Target = dyn $Trait;

            fn shape(mock: ::std::sync::Arc<$crate::Mock>) -> ::std::sync::Arc<dyn $Trait> {
                ::std::sync::Arc::new($Double(mock))
            }
        }

        impl $Trait for $Double {
            $(
            fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                self.0
                    .invoke(stringify!($method), vec![$(format!("{:?}", $arg)),*])
                    .into_value()
            }
            )*
        }
    };
}
