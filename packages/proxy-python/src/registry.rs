//! The conversion registry.
//!
//! Two independent tables: native to foreign keyed by `NativeType`, and
//! foreign to native keyed by the runtime's type name. Each converter is also
//! published in the plugin registry under `/proxy/converters/python/...`.
//! The last registration for a key wins.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lazy_static::lazy_static;
use proxy_core::{NativeType, Object, PluginPath, PluginRegistry, Result};
use pyo3::prelude::*;

use crate::environment::PythonEnvironment;

/// Turns a host object into a Python object.
pub type ToForeignFn =
    for<'py> fn(&PythonEnvironment, Python<'py>, &Object) -> Result<Bound<'py, PyAny>>;

/// Turns a Python object into a host object.
pub type ToNativeFn = for<'py> fn(&PythonEnvironment, &Bound<'py, PyAny>) -> Result<Object>;

/// A converter as published in the plugin registry.
#[derive(Clone, Copy)]
pub enum Converter {
    ToForeign {
        native: NativeType,
        convert: ToForeignFn,
    },
    ToNative {
        type_name: &'static str,
        convert: ToNativeFn,
    },
}

struct Entry<F> {
    path: PluginPath,
    convert: F,
}

lazy_static! {
    static ref TO_FOREIGN: RwLock<HashMap<NativeType, Entry<ToForeignFn>>> =
        RwLock::new(HashMap::new());
    static ref TO_NATIVE: RwLock<HashMap<String, Entry<ToNativeFn>>> =
        RwLock::new(HashMap::new());
}

fn converter_path(description: &str) -> Result<PluginPath> {
    Ok(PluginPath::parse("/proxy/converters/python")?.join(description)?)
}

/// Register a native to foreign converter for `native`.
pub fn register_to_foreign(
    description: &str,
    native: NativeType,
    convert: ToForeignFn,
) -> Result<()> {
    let path = converter_path(description)?;
    PluginRegistry::add(path.clone(), Converter::ToForeign { native, convert });
    let mut table = TO_FOREIGN.write().unwrap_or_else(PoisonError::into_inner);
    let entry = Entry {
        path: path.clone(),
        convert,
    };
    if let Some(previous) = table.insert(native, entry) {
        tracing::warn!(
            native = native.name(),
            previous = %previous.path,
            replacement = %path,
            "converter replaced"
        );
    } else {
        tracing::debug!(native = native.name(), %path, "converter registered");
    }
    Ok(())
}

/// Register a foreign to native converter for the runtime type `type_name`.
pub fn register_to_native(
    description: &str,
    type_name: &'static str,
    convert: ToNativeFn,
) -> Result<()> {
    let path = converter_path(description)?;
    PluginRegistry::add(path.clone(), Converter::ToNative { type_name, convert });
    let mut table = TO_NATIVE.write().unwrap_or_else(PoisonError::into_inner);
    let entry = Entry {
        path: path.clone(),
        convert,
    };
    if let Some(previous) = table.insert(type_name.to_string(), entry) {
        tracing::warn!(
            type_name,
            previous = %previous.path,
            replacement = %path,
            "converter replaced"
        );
    } else {
        tracing::debug!(type_name, %path, "converter registered");
    }
    Ok(())
}

pub fn lookup_to_foreign(native: NativeType) -> Option<ToForeignFn> {
    TO_FOREIGN
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&native)
        .map(|entry| entry.convert)
}

pub fn lookup_to_native(type_name: &str) -> Option<ToNativeFn> {
    TO_NATIVE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(type_name)
        .map(|entry| entry.convert)
}

/// Runtime type names with a registered converter, sorted.
pub fn native_type_names() -> Vec<String> {
    let mut names: Vec<String> = TO_NATIVE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}
