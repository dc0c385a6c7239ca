#![allow(dead_code)]

use std::sync::Arc;

use proxy_core::Proxy;
use proxy_python::{BridgeConfig, PythonEnvironment};
use pyo3::prelude::*;

pub fn environment() -> Arc<PythonEnvironment> {
    PythonEnvironment::new(BridgeConfig::default()).unwrap()
}

/// Evaluate a Python expression and wrap the result.
pub fn eval(env: &PythonEnvironment, expression: &str) -> Proxy {
    env.with_lock(|py| {
        let value = py.eval_bound(expression, None, None).unwrap();
        env.wrap(value.unbind()).unwrap()
    })
}

/// Run Python statements in a fresh namespace and wrap `name` from it.
pub fn define(env: &PythonEnvironment, code: &str, name: &str) -> Proxy {
    env.with_lock(|py| {
        let namespace = pyo3::types::PyDict::new_bound(py);
        py.run_bound(code, Some(&namespace), None).unwrap();
        let value = namespace.get_item(name).unwrap().unwrap();
        env.wrap(value.unbind()).unwrap()
    })
}

/// Reference count of the object behind `proxy`, as seen from inside a
/// call. Only differences between two readings are meaningful.
pub fn refcount(env: &PythonEnvironment, proxy: &Proxy) -> i64 {
    let sys = env.find_symbol("sys").unwrap();
    sys.call("getrefcount", &[proxy.clone()])
        .unwrap()
        .convert::<i64>()
        .unwrap()
}

pub fn numpy_available(env: &PythonEnvironment) -> bool {
    env.with_lock(|py| py.import_bound("numpy").is_ok())
}
