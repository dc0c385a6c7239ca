//! The execution lock.
//!
//! The interpreter's own re-entrant lock is the only lock: `with_lock`
//! acquires it for the duration of the closure and releases it on every exit
//! path, unwinding included. Nested use on one thread does not deadlock.

use std::cell::Cell;

use pyo3::Python;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Run `f` holding the execution lock.
///
/// The runtime must be initialized: callers hold a `RuntimeLease`, directly
/// or through an environment. Outside this crate the lock is reached through
/// `PythonEnvironment::with_lock`.
pub(crate) fn with_lock<F, R>(f: F) -> R
where
    F: for<'py> FnOnce(Python<'py>) -> R,
{
    Python::with_gil(|py| {
        let _depth = DepthGuard::enter();
        f(py)
    })
}

/// True while the current thread is inside `with_lock`.
pub fn held_by_current_thread() -> bool {
    depth() > 0
}

/// Nesting depth of `with_lock` on the current thread.
pub(crate) fn depth() -> usize {
    DEPTH.with(Cell::get)
}
