//! Process-wide lifecycle of the embedded interpreter.
//!
//! The interpreter is initialized at most once per process. Every user holds
//! a `RuntimeLease`; `shutdown` only finalizes when no lease is outstanding
//! and this crate started the interpreter itself. A host process that
//! already runs Python (for example when this crate is loaded as an
//! extension) keeps ownership of its interpreter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use lazy_static::lazy_static;
use proxy_core::{Error, Result};
use pyo3::ffi;

enum RuntimeState {
    Uninitialized,
    /// Initialized by someone else before the first lease.
    External,
    /// Initialized here. `thread_state` is the main thread state saved when
    /// the lock was released after startup.
    Embedded {
        thread_state: usize,
        thread: ThreadId,
    },
    Finalized,
}

lazy_static! {
    static ref STATE: Mutex<RuntimeState> = Mutex::new(RuntimeState::Uninitialized);
}

static LEASES: AtomicUsize = AtomicUsize::new(0);

/// Result of a `shutdown` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The interpreter was finalized.
    Finalized,
    /// The interpreter belongs to the host process and was left running.
    ExternallyOwned,
    /// Leases are still held; nothing was done.
    LeasesOutstanding(usize),
    /// Finalization must run on the thread that initialized the interpreter.
    WrongThread,
    AlreadyFinalized,
    NeverInitialized,
}

/// Keeps the interpreter alive. Clones count as separate leases.
#[derive(Debug)]
pub struct RuntimeLease {
    embedded: bool,
}

impl RuntimeLease {
    /// True when this crate initialized the interpreter.
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}

impl Clone for RuntimeLease {
    fn clone(&self) -> Self {
        LEASES.fetch_add(1, Ordering::SeqCst);
        Self {
            embedded: self.embedded,
        }
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        LEASES.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Take a lease on the interpreter, initializing it on first use.
///
/// After initialization the execution lock is released, so the interpreter
/// starts out idle and available to every thread.
///
/// # Errors
///
/// `RuntimeUnavailable` once the interpreter has been finalized; it cannot
/// be brought back.
///
/// # Panics
///
/// Panics if the interpreter fails to initialize. Nothing in the bridge can
/// work without it.
pub fn acquire() -> Result<RuntimeLease> {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let embedded = match *state {
        RuntimeState::Uninitialized => {
            // SAFETY: the state mutex serializes initialization.
            if unsafe { ffi::Py_IsInitialized() } != 0 {
                tracing::info!("python runtime already running in host process");
                *state = RuntimeState::External;
                false
            } else {
                unsafe { ffi::Py_InitializeEx(0) };
                if unsafe { ffi::Py_IsInitialized() } == 0 {
                    panic!("failed to initialize the embedded python runtime");
                }
                let thread_state = unsafe { ffi::PyEval_SaveThread() };
                *state = RuntimeState::Embedded {
                    thread_state: thread_state as usize,
                    thread: thread::current().id(),
                };
                tracing::info!("python runtime initialized");
                true
            }
        }
        RuntimeState::External => false,
        RuntimeState::Embedded { .. } => true,
        RuntimeState::Finalized => {
            return Err(Error::RuntimeUnavailable(
                "python runtime has been finalized".to_string(),
            ))
        }
    };
    LEASES.fetch_add(1, Ordering::SeqCst);
    Ok(RuntimeLease { embedded })
}

/// Number of leases currently held.
pub fn lease_count() -> usize {
    LEASES.load(Ordering::SeqCst)
}

/// Finalize the interpreter at process teardown.
///
/// Only finalizes an interpreter this crate started, with no outstanding
/// leases, from the thread that started it. The interpreter cannot be
/// initialized again afterwards.
pub fn shutdown() -> ShutdownOutcome {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    match *state {
        RuntimeState::Uninitialized => ShutdownOutcome::NeverInitialized,
        RuntimeState::External => ShutdownOutcome::ExternallyOwned,
        RuntimeState::Finalized => ShutdownOutcome::AlreadyFinalized,
        RuntimeState::Embedded {
            thread_state,
            thread,
        } => {
            let leases = lease_count();
            if leases > 0 {
                tracing::warn!(leases, "python runtime still leased, not finalizing");
                return ShutdownOutcome::LeasesOutstanding(leases);
            }
            if thread::current().id() != thread {
                return ShutdownOutcome::WrongThread;
            }
            // SAFETY: no leases remain, so no handle or environment can touch
            // the interpreter; the saved state belongs to this thread.
            unsafe {
                ffi::PyEval_RestoreThread(thread_state as *mut ffi::PyThreadState);
                ffi::Py_FinalizeEx();
            }
            *state = RuntimeState::Finalized;
            tracing::info!("python runtime finalized");
            ShutdownOutcome::Finalized
        }
    }
}
