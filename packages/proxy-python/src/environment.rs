//! The Python environment.
//!
//! A `PythonEnvironment` is the entry point the rest of the host uses: it
//! resolves symbols, converts objects in both directions and marshals
//! values. All environments share the one interpreter; each holds a runtime
//! lease and has its own identity.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use lazy_static::lazy_static;
use proxy_core::{EnvironmentId, Error, Object, Proxy, ProxyEnvironment, Result};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::config::BridgeConfig;
use crate::convert::{self, runtime_type_name};
use crate::error::PyResultExt;
use crate::handle::ForeignHandle;
use crate::lock::with_lock;
use crate::registry::{lookup_to_foreign, lookup_to_native};
use crate::runtime::{self, RuntimeLease};

lazy_static! {
    /// Whether the one-time site setup has run.
    static ref SITE_READY: Mutex<bool> = Mutex::new(false);

    /// Directories this crate has appended to `sys.path`.
    static ref SEARCH_PATHS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());

    /// The environment shared by script blocks while anyone holds it.
    static ref SHARED: Mutex<Weak<PythonEnvironment>> = Mutex::new(Weak::new());
}

/// One binding to the embedded interpreter.
pub struct PythonEnvironment {
    id: EnvironmentId,
    config: BridgeConfig,
    this: Weak<PythonEnvironment>,
    _lease: RuntimeLease,
}

impl PythonEnvironment {
    /// Create an environment, starting the interpreter if needed.
    ///
    /// The first environment in a process also performs the site setup:
    /// bytecode writing off (unless configured otherwise), the support
    /// directory on `sys.path`, and the support module imported.
    pub fn new(config: BridgeConfig) -> Result<Arc<Self>> {
        let lease = runtime::acquire()?;
        convert::register_builtin()?;
        site_setup(&config, lease.is_embedded())?;

        let env = Arc::new_cyclic(|this| PythonEnvironment {
            id: EnvironmentId::new(),
            config,
            this: this.clone(),
            _lease: lease,
        });
        tracing::info!(id = %env.id, "python environment created");
        Ok(env)
    }

    /// The environment shared by script blocks, created on first use and
    /// reused for as long as any user keeps it alive.
    pub fn shared() -> Result<Arc<Self>> {
        let mut shared = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(env) = shared.upgrade() {
            return Ok(env);
        }
        let env = Self::new(BridgeConfig::default())?;
        *shared = Arc::downgrade(&env);
        Ok(env)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `f` holding the execution lock. Re-entrant on one thread.
    pub fn with_lock<F, R>(&self, f: F) -> R
    where
        F: for<'py> FnOnce(Python<'py>) -> R,
    {
        with_lock(f)
    }

    fn arc(&self) -> Result<Arc<Self>> {
        self.this
            .upgrade()
            .ok_or_else(|| Error::RuntimeUnavailable("python environment dropped".to_string()))
    }

    /// Wrap an owned Python object as a proxy of this environment.
    pub fn wrap(&self, obj: Py<PyAny>) -> Result<Proxy> {
        Ok(Proxy::new(ForeignHandle::new(self.arc()?, obj)))
    }

    /// Resolve a module or a top-level symbol by dotted name.
    ///
    /// `a.b.c` is first imported as a module; failing that, module `a.b` is
    /// imported and attribute `c` looked up. A bare name that is not a module
    /// is looked up in `builtins`. When nothing resolves, the error carries
    /// the interpreter's message for the first import attempt.
    pub fn find_symbol(&self, name: &str) -> Result<Proxy> {
        with_lock(|py| {
            let import_error = match PyModule::import_bound(py, name) {
                Ok(module) => return self.wrap(module.into_any().unbind()),
                Err(err) => err,
            };
            let (parent, attr) = name.rsplit_once('.').unwrap_or(("builtins", name));
            match PyModule::import_bound(py, parent).and_then(|module| module.getattr(attr)) {
                Ok(symbol) => self.wrap(symbol.unbind()),
                Err(_) => Err(Error::SymbolNotFound {
                    name: name.to_string(),
                    message: import_error.to_string(),
                }),
            }
        })
    }

    /// Convert a host object into a Python proxy.
    pub fn to_foreign(&self, object: &Object) -> Result<Proxy> {
        with_lock(|py| {
            let obj = self.object_to_py(py, object)?;
            self.wrap(obj.unbind())
        })
    }

    /// Convert a Python proxy into a host object.
    ///
    /// # Errors
    ///
    /// `NoConverter` when the runtime type has no registered converter.
    /// Elements of containers without a converter come back as
    /// `Object::Proxy` instead.
    pub fn to_native(&self, proxy: &Proxy) -> Result<Object> {
        with_lock(|py| {
            let obj = self.proxy_to_py(py, proxy)?;
            self.py_to_object(&obj)
        })
    }

    /// Append `path` to `sys.path`, once per process.
    ///
    /// Returns whether the path was added by this call.
    pub fn append_search_path(&self, path: &Path) -> Result<bool> {
        let mut known = SEARCH_PATHS.lock().unwrap_or_else(PoisonError::into_inner);
        if known.contains(path) {
            return Ok(false);
        }
        let added = with_lock(|py| append_sys_path(py, path))?;
        known.insert(path.to_path_buf());
        Ok(added)
    }

    /// Convert a host object under the lock, wrapping values without a
    /// converter in a `HostObject`.
    pub(crate) fn object_to_py<'py>(
        &self,
        py: Python<'py>,
        object: &Object,
    ) -> Result<Bound<'py, PyAny>> {
        match lookup_to_foreign(object.native_type()) {
            Some(convert) => convert(self, py, object),
            None => convert::object_to_hostobject(self, py, object),
        }
    }

    /// The Python object behind `proxy`.
    ///
    /// Proxies of any Python environment share the interpreter and are used
    /// directly; proxies of other environments are first converted to an
    /// `Object` through their own environment.
    pub(crate) fn proxy_to_py<'py>(
        &self,
        py: Python<'py>,
        proxy: &Proxy,
    ) -> Result<Bound<'py, PyAny>> {
        if let Some(handle) = proxy.downcast_handle::<ForeignHandle>() {
            return Ok(handle.bind(py)?.clone());
        }
        tracing::debug!(
            from = proxy.environment().name(),
            "normalizing proxy into python environment"
        );
        let object = proxy.to_object()?;
        self.object_to_py(py, &object)
    }

    /// Strict conversion: fails with `NoConverter`.
    pub(crate) fn py_to_object(&self, obj: &Bound<'_, PyAny>) -> Result<Object> {
        let type_name = runtime_type_name(obj).or_execution(|| "type name".to_string())?;
        match lookup_to_native(&type_name) {
            Some(convert) => convert(self, obj),
            None => Err(Error::NoConverter {
                from: type_name,
                to: "Object".to_string(),
            }),
        }
    }

    /// Lenient conversion: values without a converter become proxies.
    pub(crate) fn py_to_object_lenient(&self, obj: &Bound<'_, PyAny>) -> Result<Object> {
        match self.py_to_object(obj) {
            Err(Error::NoConverter { .. }) => Ok(Object::Proxy(self.wrap(obj.clone().unbind())?)),
            other => other,
        }
    }

    /// Convert a proxy leniently, as container elements are.
    pub fn to_native_lenient(&self, proxy: &Proxy) -> Result<Object> {
        with_lock(|py| {
            let obj = self.proxy_to_py(py, proxy)?;
            self.py_to_object_lenient(&obj)
        })
    }

    /// Marshal a value with the interpreter's `marshal` module.
    pub fn serialize_to(&self, proxy: &Proxy, sink: &mut dyn Write) -> Result<()> {
        let bytes = with_lock(|py| -> Result<Vec<u8>> {
            let obj = self.proxy_to_py(py, proxy)?;
            let marshal = PyModule::import_bound(py, "marshal").or_serialize()?;
            let dumped = marshal.call_method1("dumps", (obj,)).or_serialize()?;
            let bytes = dumped
                .downcast::<PyBytes>()
                .map_err(|_| Error::Serialize {
                    message: "marshal.dumps did not return bytes".to_string(),
                })?;
            Ok(bytes.as_bytes().to_vec())
        })?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Read a value written by `serialize_to`.
    pub fn deserialize_from(&self, source: &mut dyn Read) -> Result<Proxy> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        with_lock(|py| {
            let marshal = PyModule::import_bound(py, "marshal").or_serialize()?;
            let loaded = marshal
                .call_method1("loads", (PyBytes::new_bound(py, &bytes),))
                .or_serialize()?;
            self.wrap(loaded.unbind())
        })
    }
}

impl ProxyEnvironment for PythonEnvironment {
    fn name(&self) -> &str {
        "python"
    }

    fn id(&self) -> EnvironmentId {
        self.id
    }

    fn find_proxy(&self, name: &str) -> Result<Proxy> {
        self.find_symbol(name)
    }

    fn convert_object_to_proxy(&self, object: &Object) -> Result<Proxy> {
        self.to_foreign(object)
    }

    fn convert_proxy_to_object(&self, proxy: &Proxy) -> Result<Object> {
        self.to_native(proxy)
    }

    fn serialize(&self, proxy: &Proxy, sink: &mut dyn Write) -> Result<()> {
        self.serialize_to(proxy, sink)
    }

    fn deserialize(&self, source: &mut dyn Read) -> Result<Proxy> {
        self.deserialize_from(source)
    }
}

fn append_sys_path(py: Python<'_>, path: &Path) -> Result<bool> {
    let context = || format!("sys.path.append({})", path.display());
    let sys_path = PyModule::import_bound(py, "sys")
        .and_then(|sys| sys.getattr("path"))
        .or_execution(context)?;
    let entry = path.to_string_lossy().into_owned();
    if sys_path.contains(&entry).or_execution(context)? {
        return Ok(false);
    }
    sys_path
        .call_method1("append", (entry,))
        .or_execution(context)?;
    tracing::debug!(path = %path.display(), "appended to python search path");
    Ok(true)
}

fn site_setup(config: &BridgeConfig, embedded: bool) -> Result<()> {
    let mut ready = SITE_READY.lock().unwrap_or_else(PoisonError::into_inner);
    if *ready {
        return Ok(());
    }
    with_lock(|py| -> Result<()> {
        if embedded {
            PyModule::import_bound(py, "sys")
                .and_then(|sys| sys.setattr("dont_write_bytecode", !config.write_bytecode))
                .or_execution(|| "sys.dont_write_bytecode".to_string())?;
        }
        append_sys_path(py, &config.support_path)?;
        if let Some(module) = &config.support_module {
            PyModule::import_bound(py, module.as_str()).map_err(|err| Error::SymbolNotFound {
                name: module.clone(),
                message: err.to_string(),
            })?;
            tracing::debug!(module = %module, "support module imported");
        }
        Ok(())
    })?;
    SEARCH_PATHS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(config.support_path.clone());
    *ready = true;
    Ok(())
}
