//! Mapping Python exceptions onto bridge errors, and back.

use proxy_core::Error;
use pyo3::exceptions::PyRuntimeError;
use pyo3::{PyErr, PyResult};

pub use proxy_core::Result;

/// Attach context to a failed Python call.
pub(crate) trait PyResultExt<T> {
    /// Map a Python exception to `Error::Execution`, carrying the
    /// exception's `Type: message` text.
    fn or_execution(self, context: impl FnOnce() -> String) -> Result<T>;

    /// Map a Python exception to `Error::Serialize`.
    fn or_serialize(self) -> Result<T>;
}

impl<T> PyResultExt<T> for PyResult<T> {
    fn or_execution(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|err| Error::execution(context(), err.to_string()))
    }

    fn or_serialize(self) -> Result<T> {
        self.map_err(|err| Error::Serialize {
            message: err.to_string(),
        })
    }
}

/// Raise a bridge error in Python as `RuntimeError`.
pub(crate) fn raise(err: Error) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}
