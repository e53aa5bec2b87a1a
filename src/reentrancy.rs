//! Debug-only reentrancy guard.
//!
//! Probing calls user `Hash` and `Eq`. A table must not be entered again
//! from inside those calls while a probe is in flight. In debug builds,
//! entering twice without dropping the guard panics. In release builds,
//! this compiles to a zero-cost no-op.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-table reentrancy tracker. Probing entry points open a section with
/// `let _g = self.reentrancy.enter();`.
///
/// Always `!Sync`, in every build profile, so a table can move between
/// threads but never be shared by them.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    _nosync: PhantomData<Cell<()>>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            _nosync: PhantomData,
        }
    }

    /// Enter a guarded section. In debug builds, panics if already entered.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(d == 0, "reentrancy detected: nested entry into hash table");
            self.depth.set(d + 1);
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _z: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DebugReentrancy;

    #[test]
    fn enter_and_exit_is_ok() {
        let r = DebugReentrancy::new();
        {
            let _g = r.enter();
        }
        // Sequential sections are fine.
        let _g = r.enter();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_in_debug() {
        let r = DebugReentrancy::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g1 = r.enter();
            let _g2 = r.enter();
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        // The unwound guard released its section.
        let _g = r.enter();
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn reentrancy_noop_in_release() {
        let r = DebugReentrancy::new();
        let _g1 = r.enter();
        let _g2 = r.enter();
    }
}
