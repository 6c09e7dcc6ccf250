//! Injected replacements for the guest's non-deterministic host primitives.
//!
//! Replayed executions must observe exactly the same values a prior execution did, so the
//! random and clock imports are backed by capabilities chosen at instance construction
//! instead of by process-wide primitives. Two instances never share capability state, which
//! is what allows independent instances to run concurrently.

use core::fmt::Debug;
use std::sync::Arc;

use auto_impl::auto_impl;

/// Source of the values handed to the guest through its `random_f64` import.
///
/// Implementations must be deterministic for replay: given the same construction inputs,
/// the same call sequence yields the same value sequence. Stateful sources use interior
/// mutability since the sandbox only holds a shared handle.
#[auto_impl(&, Box, Arc)]
pub trait RandomSource: Debug + Send + Sync + Unpin {
    /// The next value observed by the guest's random import.
    fn next_f64(&self) -> f64;
}

/// Clock behind the guest's `clock_ms` import.
#[auto_impl(&, Box, Arc)]
pub trait Clock: Debug + Send + Sync + Unpin {
    /// Milliseconds reported to the guest as the current time.
    fn now_ms(&self) -> i64;
}

/// A [`RandomSource`] that always yields the same value.
///
/// The default value is `0.5`, the canonical replay constant: every re-execution of a
/// message sequence observes the identical random stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRandom(pub f64);

impl FixedRandom {
    /// Consumes and wraps `self` into an Arc-wrapped instance of the [`RandomSource`] trait.
    pub fn shared(self) -> Arc<dyn RandomSource> {
        Arc::new(self)
    }
}

impl Default for FixedRandom {
    fn default() -> Self {
        Self(0.5)
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// A [`Clock`] frozen at a fixed instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrozenClock(pub i64);

impl FrozenClock {
    /// Consumes and wraps `self` into an Arc-wrapped instance of the [`Clock`] trait.
    pub fn shared(self) -> Arc<dyn Clock> {
        Arc::new(self)
    }
}

impl Clock for FrozenClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}
