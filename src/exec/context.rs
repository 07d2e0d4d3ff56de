//! Per-feature execution context
//!
//! The fixture context of a running feature lives in a per-thread teardown
//! slot. Two paths can empty the slot: dropping the [`FeatureContext`] (body
//! returned or unwound) and an `atexit` handler (body called `exit`). Whichever
//! runs first takes the entry and runs the teardown; the other finds it gone.

use crate::kernel::signal::{self, EscapeOutcome};
use crate::registry::model::{Context, Fixture};
use nix::sys::signal::Signal;
use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::sync::Once;

/// A set-up fixture whose teardown has not run yet.
struct ArmedTeardown {
    id: u64,
    fixture: Fixture,
    /// Produced by `Box::into_raw`; turned back into a box exactly once.
    context: *mut dyn Any,
}

impl ArmedTeardown {
    fn run(self) {
        // SAFETY: the pointer came from Box::into_raw in set_up and the entry
        // was removed from the slot before this call, so nobody else frees it.
        let context: Context = unsafe { Box::from_raw(self.context) };
        self.fixture.teardown(context);
    }
}

thread_local! {
    static ARMED: RefCell<Vec<ArmedTeardown>> = RefCell::new(Vec::new());
    static NEXT_ID: Cell<u64> = Cell::new(0);
}

static EXIT_HANDLER: Once = Once::new();

/// Runs at `exit()`: tear down whatever is still armed, innermost first.
extern "C" fn teardown_at_exit() {
    loop {
        let armed = ARMED
            .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.pop()))
            .ok()
            .flatten();
        match armed {
            Some(armed) => armed.run(),
            None => break,
        }
    }
}

fn register_exit_handler() {
    EXIT_HANDLER.call_once(|| {
        // SAFETY: the handler only touches this thread's slot and runs teardowns.
        if unsafe { libc::atexit(teardown_at_exit) } != 0 {
            log::warn!("Unable to register exit-time fixture teardown");
        }
    });
}

/// Remove the entry `id` from the slot, if still there.
fn disarm(id: u64) -> Option<ArmedTeardown> {
    ARMED
        .try_with(|slot| {
            let mut slot = slot.borrow_mut();
            let index = slot.iter().position(|armed| armed.id == id)?;
            Some(slot.remove(index))
        })
        .ok()
        .flatten()
}

/// Execution context handed to every feature body.
///
/// Gives typed access to the fixture context. The teardown fires exactly once
/// when the feature process winds down: on drop (body returned or panicked) or
/// at `exit()` (body exited directly).
pub struct FeatureContext {
    trait_name: String,
    feature_name: String,
    fixture_name: String,
    id: u64,
    context: *mut dyn Any,
}

impl FeatureContext {
    /// Run the fixture setup and arm its teardown.
    pub(crate) fn set_up(trait_name: &str, feature_name: &str, fixture: &Fixture) -> Self {
        register_exit_handler();

        let context = Box::into_raw(fixture.setup());
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        ARMED.with(|slot| {
            slot.borrow_mut().push(ArmedTeardown {
                id,
                fixture: fixture.clone(),
                context,
            })
        });

        log::debug!(
            "Fixture `{}` set up for {}::{}",
            fixture.name(),
            trait_name,
            feature_name
        );
        Self {
            trait_name: trait_name.to_string(),
            feature_name: feature_name.to_string(),
            fixture_name: fixture.name().to_string(),
            id,
            context,
        }
    }

    pub fn trait_name(&self) -> &str {
        &self.trait_name
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    /// The fixture context, if it is a `T`.
    pub fn try_context<T: Any>(&mut self) -> Option<&mut T> {
        // SAFETY: the box stays alive until this context is dropped or the
        // process exits; `&mut self` makes the borrow exclusive.
        unsafe { (*self.context).downcast_mut::<T>() }
    }

    /// The fixture context as a `T`.
    ///
    /// # Panics
    ///
    /// If the fixture produced some other type; the feature then fails.
    pub fn context<T: Any>(&mut self) -> &mut T {
        let fixture = self.fixture_name.clone();
        match self.try_context::<T>() {
            Some(value) => value,
            None => panic!(
                "fixture `{}` did not produce a context of type {}",
                fixture,
                type_name::<T>()
            ),
        }
    }

    /// Signals intercepted by escape scopes in this feature so far.
    pub fn wrapped_signals(&self) -> usize {
        signal::wrapped_signals()
    }

    /// Run `block` in an escape scope for `signal`; see [`signal::SignalEscape`].
    pub fn escape<F>(&self, signal: Signal, block: F) -> EscapeOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        signal::wrap(signal, block)
    }
}

impl Drop for FeatureContext {
    fn drop(&mut self) {
        // Taken out of the slot first: a teardown that calls exit() must not
        // find itself still armed.
        if let Some(armed) = disarm(self.id) {
            armed.run();
            log::debug!(
                "Fixture `{}` torn down for {}::{}",
                self.fixture_name,
                self.trait_name,
                self.feature_name
            );
        }
    }
}
