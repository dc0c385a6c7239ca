//! Host values Python has no type for, and proxies.
//!
//! A host value without a converter travels as a `proxy_bridge.HostObject`,
//! which Python code can pass around and hand back unchanged.

use proxy_core::{Error, NativeType, Object, Result};
use pyo3::prelude::*;

use crate::environment::PythonEnvironment;
use crate::registry::{register_to_foreign, register_to_native};

/// A host `Object` held by Python.
#[pyclass(module = "proxy_bridge", name = "HostObject", frozen)]
pub struct HostObject {
    object: Object,
}

impl HostObject {
    pub fn new(object: Object) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &Object {
        &self.object
    }
}

#[pymethods]
impl HostObject {
    /// Host type name of the held value.
    #[getter]
    fn type_name(&self) -> String {
        self.object.type_name()
    }

    fn __repr__(&self) -> String {
        format!("HostObject({})", self.object.type_name())
    }
}

pub(crate) fn object_to_hostobject<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    tracing::debug!(type_name = %object.type_name(), "wrapping host value for python");
    Bound::new(py, HostObject::new(object.clone()))
        .map(Bound::into_any)
        .map_err(|err| Error::execution("wrap(HostObject)", err.to_string()))
}

fn proxy_to_pyobject<'py>(
    env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    match object {
        Object::Proxy(proxy) => env.proxy_to_py(py, proxy),
        other => Err(Error::mismatch("proxy", other.type_name())),
    }
}

fn hostobject_to_object(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let host = obj
        .downcast::<HostObject>()
        .map_err(|_| Error::mismatch("proxy_bridge.HostObject", "foreign object"))?;
    Ok(host.get().object.clone())
}

pub(super) fn register() -> Result<()> {
    register_to_foreign("proxy_to_pyobject", NativeType::Proxy, proxy_to_pyobject)?;
    register_to_native(
        "hostobject_to_object",
        "proxy_bridge.HostObject",
        hostobject_to_object,
    )?;
    Ok(())
}
