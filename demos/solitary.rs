use std::sync::Arc;

use unitwire::*;

// Define regular traits and the class under test

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

struct DateLogger {
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
}

impl DateLogger {
    fn log_date(&self) {
        self.logger
            .log(&format!("{}s since epoch", self.clock.now()));
    }
}

// Declare the dependencies of the class, the logger is bound to a token

impl Injectable for DateLogger {
    fn metadata() -> ClassMetadata {
        ClassMetadata::new()
            .param(ClassRef::of::<dyn Clock>())
            .param(ReflectedType::Object)
            .inject(1, "LOGGER")
    }

    fn construct(args: &mut Arguments) -> Result<Self, WiringError> {
        Ok(DateLogger {
            clock: args.next()?,
            logger: args.next()?,
        })
    }
}

// Doubles for the injected traits

double! {
    ClockDouble: dyn Clock {
        fn now(&self) -> u64;
    }
}

double! {
    LoggerDouble: dyn Logger {
        fn log(&self, content: &str);
    }
}

fn main() -> Result<(), WiringError> {
    let harness = Harness::new(
        ReflectingAdapter::default(),
        Doubles::new()
            .with::<ClockDouble>()
            .shape_for("LOGGER", <LoggerDouble as Shape>::shape),
    );

    let CompiledUnit { unit, unit_ref } = harness
        .solitary::<DateLogger>()
        .mock(Identifier::of::<dyn Clock>())
        .impl_with(|stub| Partial::new().stub("now", stub().returns(1_700_000_000u64)))
        .compile()?;

    unit.log_date();

    for call in unit_ref.get("LOGGER")?.stub("log").calls() {
        println!("logged {}", call.join(", "));
    }

    Ok(())
}
