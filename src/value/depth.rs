//! Nesting budget for deserializing [`Value`](super::Value) trees.
//!
//! Container variants route through [`nested`], which spends one level of a
//! thread-local budget for the duration of the inner deserialize. The budget
//! is only armed inside a [`limit`] guard; without one nesting is unbounded
//! and the outer format applies its own limits.

use std::cell::Cell;

use serde::de::{Deserialize, Deserializer, Error as _};

pub(crate) const DEPTH_EXCEEDED: &str = "maximum nesting depth exceeded";

thread_local! {
    static BUDGET: Cell<Option<usize>> = const { Cell::new(None) };
    static TRIPPED: Cell<bool> = const { Cell::new(false) };
}

/// Armed budget; restores the previous one on drop.
pub(crate) struct Limit {
    prev: Option<usize>,
    prev_tripped: bool,
}

impl Limit {
    /// `true` if a container was refused since this guard was created.
    pub(crate) fn exceeded(&self) -> bool {
        TRIPPED.get()
    }
}

impl Drop for Limit {
    fn drop(&mut self) {
        BUDGET.set(self.prev);
        TRIPPED.set(self.prev_tripped);
    }
}

/// Arms a budget of `max_depth` nested containers on this thread.
pub(crate) fn limit(max_depth: usize) -> Limit {
    let guard = Limit {
        prev: BUDGET.get(),
        prev_tripped: TRIPPED.get(),
    };
    BUDGET.set(Some(max_depth));
    TRIPPED.set(false);
    guard
}

/// `deserialize_with` hook for container variants.
pub(crate) fn nested<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let Some(remaining) = BUDGET.get() else {
        return T::deserialize(de);
    };
    if remaining == 0 {
        TRIPPED.set(true);
        return Err(D::Error::custom(DEPTH_EXCEEDED));
    }
    BUDGET.set(Some(remaining - 1));
    let out = T::deserialize(de);
    BUDGET.set(Some(remaining));
    out
}
