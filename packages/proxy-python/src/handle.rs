//! Foreign handles: ownership of one Python object.

use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use proxy_core::{Error, Object, Proxy, ProxyEnvironment, ProxyHandle, Result};
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::PyTuple;

use crate::environment::PythonEnvironment;
use crate::error::PyResultExt;
use crate::lock::with_lock;

/// How a raw object pointer is handed to `ForeignHandle::from_raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The caller transfers a reference it owns.
    Owned,
    /// The caller keeps its reference; the handle takes one of its own.
    Borrowed,
}

/// One Python object held by an environment.
///
/// The handle owns exactly one reference. It is given back under the
/// execution lock by `release` or on drop, whichever comes first.
pub struct ForeignHandle {
    env: Arc<PythonEnvironment>,
    obj: Option<Py<PyAny>>,
}

impl ForeignHandle {
    /// Take ownership of `obj`.
    pub fn new(env: Arc<PythonEnvironment>, obj: Py<PyAny>) -> Self {
        Self {
            env,
            obj: Some(obj),
        }
    }

    /// Wrap a raw object pointer.
    ///
    /// # Errors
    ///
    /// A null pointer is reported as an execution error carrying the
    /// pending Python exception.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object. With
    /// `Ownership::Owned` the caller must own one reference, which moves into
    /// the handle.
    pub unsafe fn from_raw(
        env: Arc<PythonEnvironment>,
        ptr: *mut ffi::PyObject,
        ownership: Ownership,
    ) -> Result<Self> {
        let obj = with_lock(|py| match ownership {
            Ownership::Owned => Py::from_owned_ptr_or_err(py, ptr),
            Ownership::Borrowed => Py::from_borrowed_ptr_or_err(py, ptr),
        })
        .or_execution(|| "make handle".to_string())?;
        Ok(Self::new(env, obj))
    }

    /// The Python environment that owns this handle.
    pub fn env(&self) -> &Arc<PythonEnvironment> {
        &self.env
    }

    /// The held object, or `None` after `release`.
    pub fn object(&self) -> Option<&Py<PyAny>> {
        self.obj.as_ref()
    }

    /// Borrow the object under the lock token `py`.
    pub fn bind<'py>(&self, py: Python<'py>) -> Result<&Bound<'py, PyAny>> {
        self.obj
            .as_ref()
            .map(|obj| obj.bind(py))
            .ok_or_else(|| Error::execution("handle", "object already released"))
    }

    pub fn is_released(&self) -> bool {
        self.obj.is_none()
    }

    /// Give the reference back. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(obj) = self.obj.take() {
            with_lock(|_py| drop(obj));
        }
    }

    /// Call method `name`, converting host arguments through this handle's
    /// environment.
    pub fn call_with_objects(&self, name: &str, args: &[Object]) -> Result<Proxy> {
        let env = self.env.clone();
        with_lock(|py| {
            let obj = self.bind(py)?;
            let args = args
                .iter()
                .map(|arg| env.object_to_py(py, arg))
                .collect::<Result<Vec<_>>>()?;
            let result = obj
                .call_method1(name, PyTuple::new_bound(py, args))
                .or_execution(|| format!("call({})", name))?;
            env.wrap(result.unbind())
        })
    }

    fn with_bound<R>(
        &self,
        f: impl for<'py> FnOnce(Python<'py>, &Bound<'py, PyAny>) -> Result<R>,
    ) -> Result<R> {
        with_lock(|py| {
            let bound = self.bind(py)?;
            f(py, bound)
        })
    }

    fn wrap(&self, obj: Bound<'_, PyAny>) -> Proxy {
        Proxy::new(ForeignHandle::new(self.env.clone(), obj.unbind()))
    }

    fn arguments<'py>(&self, py: Python<'py>, args: &[Proxy]) -> Result<Bound<'py, PyTuple>> {
        let args = args
            .iter()
            .map(|arg| self.env.proxy_to_py(py, arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(PyTuple::new_bound(py, args))
    }
}

impl Drop for ForeignHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl ProxyHandle for ForeignHandle {
    fn environment(&self) -> Arc<dyn ProxyEnvironment> {
        self.env.clone()
    }

    fn call(&self, name: &str, args: &[Proxy]) -> Result<Proxy> {
        self.with_bound(|py, obj| {
            let args = self.arguments(py, args)?;
            let result = obj
                .call_method1(name, args)
                .or_execution(|| format!("call({})", name))?;
            Ok(self.wrap(result))
        })
    }

    fn invoke(&self, args: &[Proxy]) -> Result<Proxy> {
        self.with_bound(|py, obj| {
            let args = self.arguments(py, args)?;
            let result = obj.call1(args).or_execution(|| "invoke".to_string())?;
            Ok(self.wrap(result))
        })
    }

    fn get(&self, name: &str) -> Result<Proxy> {
        self.with_bound(|_py, obj| {
            let value = obj.getattr(name).or_execution(|| format!("get({})", name))?;
            Ok(self.wrap(value))
        })
    }

    fn set(&self, name: &str, value: &Proxy) -> Result<()> {
        self.with_bound(|py, obj| {
            let value = self.env.proxy_to_py(py, value)?;
            obj.setattr(name, value)
                .or_execution(|| format!("set({})", name))
        })
    }

    fn compare_to(&self, other: &Proxy) -> Result<Ordering> {
        self.with_bound(|py, obj| {
            let other = self.env.proxy_to_py(py, other)?;
            obj.compare(other).or_execution(|| "compare".to_string())
        })
    }

    fn class_name(&self) -> String {
        with_lock(|py| match self.bind(py) {
            Ok(obj) => crate::convert::runtime_type_name(obj)
                .unwrap_or_else(|_| "<unknown>".to_string()),
            Err(_) => "<released>".to_string(),
        })
    }

    fn to_display(&self) -> String {
        with_lock(|py| match self.bind(py) {
            Ok(obj) => obj
                .str()
                .map(|s| s.to_string())
                .unwrap_or_else(|err| format!("<unprintable: {}>", err)),
            Err(_) => "<released>".to_string(),
        })
    }

    fn identity(&self) -> usize {
        self.obj
            .as_ref()
            .map(|obj| obj.as_ptr() as usize)
            .unwrap_or(0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
