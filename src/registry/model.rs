//! Registry model
//! Subject -> Traits -> Features -> Fixture, declared up front and never mutated while running.

use crate::exec::context::FeatureContext;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Opaque per-feature state produced by a fixture's setup.
pub type Context = Box<dyn Any>;

type SetupFn = Rc<dyn Fn() -> Context>;
type TeardownFn = Rc<dyn Fn(Context)>;
type FeatureBody = Rc<dyn Fn(&mut FeatureContext)>;

/// Paired setup/teardown. Setup runs in the feature's child process right
/// before the body; teardown receives the context when that process ends.
#[derive(Clone)]
pub struct Fixture {
    name: String,
    setup: SetupFn,
    teardown: TeardownFn,
}

impl Fixture {
    /// Typed fixture: `setup` builds a `T`, `teardown` gets it back.
    pub fn new<T, S, D>(name: impl Into<String>, setup: S, teardown: D) -> Self
    where
        T: Any,
        S: Fn() -> T + 'static,
        D: Fn(T) + 'static,
    {
        Self {
            name: name.into(),
            setup: Rc::new(move || Box::new(setup()) as Context),
            teardown: Rc::new(move |context: Context| {
                if let Ok(value) = context.downcast::<T>() {
                    teardown(*value);
                }
            }),
        }
    }

    /// Fixture whose context is `()` and whose teardown does nothing.
    pub fn none() -> Self {
        Self::new("default", || (), |()| {})
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn setup(&self) -> Context {
        (self.setup)()
    }

    pub(crate) fn teardown(&self, context: Context) {
        (self.teardown)(context)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture").field("name", &self.name).finish()
    }
}

/// One test case: a body, the fixture it runs under, and a skip flag.
#[derive(Clone)]
pub struct Feature {
    name: String,
    fixture: Fixture,
    body: FeatureBody,
    skip: bool,
}

impl Feature {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FeatureContext) + 'static,
    {
        Self {
            name: name.into(),
            fixture: Fixture::none(),
            body: Rc::new(body),
            skip: false,
        }
    }

    pub fn with_fixture(mut self, fixture: &Fixture) -> Self {
        self.fixture = fixture.clone();
        self
    }

    /// Mark as skipped: never forked, never set up, counted as skipped.
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub(crate) fn call(&self, context: &mut FeatureContext) {
        (self.body)(context)
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("name", &self.name)
            .field("fixture", &self.fixture.name)
            .field("skip", &self.skip)
            .finish()
    }
}

/// Named, ordered group of features.
#[derive(Clone, Debug)]
pub struct Trait {
    name: String,
    features: Vec<Feature>,
}

impl Trait {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Add a feature running under the default fixture.
    pub fn run<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FeatureContext) + 'static,
    {
        self.feature(Feature::new(name, body))
    }

    pub fn run_with<F>(self, name: impl Into<String>, fixture: &Fixture, body: F) -> Self
    where
        F: Fn(&mut FeatureContext) + 'static,
    {
        self.feature(Feature::new(name, body).with_fixture(fixture))
    }

    /// Declare a feature that is reported but never executed.
    pub fn skip<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FeatureContext) + 'static,
    {
        self.feature(Feature::new(name, body).skipped())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }
}

/// Root of a run.
#[derive(Clone, Debug)]
pub struct Subject {
    name: String,
    traits: Vec<Trait>,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: Vec::new(),
        }
    }

    pub fn with_trait(mut self, declared: Trait) -> Self {
        if self.traits.iter().any(|t| t.name == declared.name) {
            log::warn!(
                "Trait `{}` declared twice in `{}`; selecting it by name picks every copy",
                declared.name,
                self.name
            );
        }
        self.traits.push(declared);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn traits(&self) -> &[Trait] {
        &self.traits
    }

    /// Total number of declared features, skipped ones included.
    pub fn feature_count(&self) -> usize {
        self.traits.iter().map(|t| t.features.len()).sum()
    }
}
