//! Containers: every element goes through the full conversion path.

use std::collections::{BTreeMap, BTreeSet};

use proxy_core::{Error, NativeType, Object, Result};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PySet};

use crate::environment::PythonEnvironment;
use crate::error::PyResultExt;
use crate::registry::{register_to_foreign, register_to_native};

fn vector_to_pylist<'py>(
    env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let Object::Vector(items) = object else {
        return Err(Error::mismatch("vector", object.type_name()));
    };
    let items = items
        .iter()
        .map(|item| env.object_to_py(py, item))
        .collect::<Result<Vec<_>>>()?;
    Ok(PyList::new_bound(py, items).into_any())
}

fn set_to_pyset<'py>(
    env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let Object::Set(items) = object else {
        return Err(Error::mismatch("set", object.type_name()));
    };
    let set = PySet::empty_bound(py).or_execution(|| "convert(set)".to_string())?;
    for item in items {
        set.add(env.object_to_py(py, item)?)
            .or_execution(|| "convert(set)".to_string())?;
    }
    Ok(set.into_any())
}

fn map_to_pydict<'py>(
    env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let Object::Map(entries) = object else {
        return Err(Error::mismatch("map", object.type_name()));
    };
    let dict = PyDict::new_bound(py);
    for (key, value) in entries {
        dict.set_item(env.object_to_py(py, key)?, env.object_to_py(py, value)?)
            .or_execution(|| "convert(dict)".to_string())?;
    }
    Ok(dict.into_any())
}

fn elements(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Vec<Object>> {
    let mut items = Vec::new();
    for item in obj.iter().or_execution(|| "iterate".to_string())? {
        let item = item.or_execution(|| "iterate".to_string())?;
        items.push(env.py_to_object_lenient(&item)?);
    }
    Ok(items)
}

fn pysequence_to_vector(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    Ok(Object::Vector(elements(env, obj)?))
}

fn pyset_to_set(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let items: BTreeSet<Object> = elements(env, obj)?.into_iter().collect();
    Ok(Object::Set(items))
}

fn pydict_to_map(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let dict = obj
        .downcast::<PyDict>()
        .map_err(|_| Error::mismatch("dict", "non-dict object"))?;
    let mut entries = BTreeMap::new();
    for (key, value) in dict.iter() {
        entries.insert(
            env.py_to_object_lenient(&key)?,
            env.py_to_object_lenient(&value)?,
        );
    }
    Ok(Object::Map(entries))
}

pub(super) fn register() -> Result<()> {
    register_to_foreign("vector_to_pylist", NativeType::Vector, vector_to_pylist)?;
    register_to_foreign("set_to_pyset", NativeType::Set, set_to_pyset)?;
    register_to_foreign("map_to_pydict", NativeType::Map, map_to_pydict)?;

    register_to_native("pytuple_to_vector", "tuple", pysequence_to_vector)?;
    register_to_native("pylist_to_vector", "list", pysequence_to_vector)?;
    register_to_native("pyset_to_set", "set", pyset_to_set)?;
    register_to_native("pyfrozenset_to_set", "frozenset", pyset_to_set)?;
    register_to_native("pydict_to_map", "dict", pydict_to_map)?;
    Ok(())
}
