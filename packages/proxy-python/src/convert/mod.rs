//! Built-in converters between `Object` and Python objects.

mod container;
mod numpy;
mod opaque;
mod scalar;

use std::sync::{Mutex, PoisonError};

use proxy_core::Result;
use pyo3::prelude::*;
use pyo3::types::PyType;

pub use numpy::BufferView;
pub use opaque::HostObject;
pub(crate) use opaque::object_to_hostobject;

/// The runtime's name for the type of `obj`.
///
/// Builtins report their bare qualified name (`int`, `dict`); everything else
/// is prefixed with its module (`numpy.ndarray`).
pub fn runtime_type_name(obj: &Bound<'_, PyAny>) -> PyResult<String> {
    type_name_of(&obj.get_type())
}

fn type_name_of(ty: &Bound<'_, PyType>) -> PyResult<String> {
    let qualname: String = ty.getattr("__qualname__")?.extract()?;
    let module: String = ty.getattr("__module__")?.extract()?;
    if module == "builtins" {
        Ok(qualname)
    } else {
        Ok(format!("{}.{}", module, qualname))
    }
}

/// Register every built-in converter.
///
/// Runs to completion once per process. A failed attempt is retried by the
/// next call.
pub(crate) fn register_builtin() -> Result<()> {
    static REGISTERED: Mutex<bool> = Mutex::new(false);
    register_once(&REGISTERED, || {
        scalar::register()?;
        container::register()?;
        numpy::register()?;
        opaque::register()?;
        Ok(())
    })
}

fn register_once(done: &Mutex<bool>, register: impl FnOnce() -> Result<()>) -> Result<()> {
    let mut done = done.lock().unwrap_or_else(PoisonError::into_inner);
    if *done {
        return Ok(());
    }
    register().inspect_err(|err| {
        tracing::warn!(%err, "built-in converter registration failed");
    })?;
    *done = true;
    Ok(())
}
