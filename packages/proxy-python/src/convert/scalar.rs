//! Scalars: none, bool, int, float, complex, str, bytes.

use proxy_core::{Complex64, Error, NativeType, Object, Result};
use pyo3::prelude::*;
use pyo3::types::{PyByteArray, PyBytes, PyComplex, PyString};

use crate::environment::PythonEnvironment;
use crate::error::PyResultExt;
use crate::registry::{register_to_foreign, register_to_native};

fn null_to_pynone<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    _object: &Object,
) -> Result<Bound<'py, PyAny>> {
    Ok(py.None().into_bound(py))
}

fn bool_to_pybool<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let value: bool = object.convert()?;
    Ok(value.into_py(py).into_bound(py))
}

fn sint_to_pyint<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let value: i64 = object.convert()?;
    Ok(value.into_py(py).into_bound(py))
}

fn uint_to_pyint<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let value: u64 = object.convert()?;
    Ok(value.into_py(py).into_bound(py))
}

fn float_to_pyfloat<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let value: f64 = object.convert()?;
    Ok(value.into_py(py).into_bound(py))
}

fn complex_to_pycomplex<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let value: Complex64 = object.convert()?;
    Ok(PyComplex::from_doubles_bound(py, value.re, value.im).into_any())
}

fn string_to_pystr<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    match object {
        Object::String(s) => Ok(PyString::new_bound(py, s).into_any()),
        other => Err(Error::mismatch("string", other.type_name())),
    }
}

fn bytes_to_pybytes<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    match object {
        Object::Bytes(b) => Ok(PyBytes::new_bound(py, b).into_any()),
        other => Err(Error::mismatch("bytes", other.type_name())),
    }
}

fn pynone_to_null(_env: &PythonEnvironment, _obj: &Bound<'_, PyAny>) -> Result<Object> {
    Ok(Object::Null)
}

fn pybool_to_bool(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value: bool = obj.extract().or_execution(|| "convert(bool)".to_string())?;
    Ok(Object::Bool(value))
}

/// Integers come back as `I64`, or as `U64` holding the low 64 bits of the
/// two's complement value when they do not fit.
fn pyint_to_int(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    if let Ok(value) = obj.extract::<i64>() {
        return Ok(Object::I64(value));
    }
    let wrapped = obj
        .call_method1("__and__", (u64::MAX,))
        .and_then(|masked| masked.extract::<u64>())
        .or_execution(|| "convert(int)".to_string())?;
    Ok(Object::U64(wrapped))
}

fn pyfloat_to_double(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value: f64 = obj.extract().or_execution(|| "convert(float)".to_string())?;
    Ok(Object::F64(value))
}

fn pycomplex_to_complex(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value = obj
        .downcast::<PyComplex>()
        .map_err(|_| Error::mismatch("complex", "non-complex object"))?;
    Ok(Object::Complex64(Complex64::new(value.real(), value.imag())))
}

fn pystr_to_string(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value: String = obj.extract().or_execution(|| "convert(str)".to_string())?;
    Ok(Object::String(value))
}

fn pybytes_to_bytes(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value = obj
        .downcast::<PyBytes>()
        .map_err(|_| Error::mismatch("bytes", "non-bytes object"))?;
    Ok(Object::bytes(value.as_bytes()))
}

fn pybytearray_to_bytes(_env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let value = obj
        .downcast::<PyByteArray>()
        .map_err(|_| Error::mismatch("bytearray", "non-bytearray object"))?;
    Ok(Object::Bytes(value.to_vec()))
}

pub(super) fn register() -> Result<()> {
    register_to_foreign("null_to_pynone", NativeType::Null, null_to_pynone)?;
    register_to_foreign("bool_to_pybool", NativeType::Bool, bool_to_pybool)?;
    register_to_foreign("sint8_to_pyint", NativeType::I8, sint_to_pyint)?;
    register_to_foreign("sint16_to_pyint", NativeType::I16, sint_to_pyint)?;
    register_to_foreign("sint32_to_pyint", NativeType::I32, sint_to_pyint)?;
    register_to_foreign("sint64_to_pyint", NativeType::I64, sint_to_pyint)?;
    register_to_foreign("uint8_to_pyint", NativeType::U8, uint_to_pyint)?;
    register_to_foreign("uint16_to_pyint", NativeType::U16, uint_to_pyint)?;
    register_to_foreign("uint32_to_pyint", NativeType::U32, uint_to_pyint)?;
    register_to_foreign("uint64_to_pyint", NativeType::U64, uint_to_pyint)?;
    register_to_foreign("float_to_pyfloat", NativeType::F32, float_to_pyfloat)?;
    register_to_foreign("double_to_pyfloat", NativeType::F64, float_to_pyfloat)?;
    register_to_foreign("complex64_to_pycomplex", NativeType::Complex32, complex_to_pycomplex)?;
    register_to_foreign("complex128_to_pycomplex", NativeType::Complex64, complex_to_pycomplex)?;
    register_to_foreign("string_to_pystr", NativeType::String, string_to_pystr)?;
    register_to_foreign("bytes_to_pybytes", NativeType::Bytes, bytes_to_pybytes)?;

    register_to_native("pynone_to_null", "NoneType", pynone_to_null)?;
    register_to_native("pybool_to_bool", "bool", pybool_to_bool)?;
    register_to_native("pyint_to_int", "int", pyint_to_int)?;
    register_to_native("pyfloat_to_double", "float", pyfloat_to_double)?;
    register_to_native("pycomplex_to_complex", "complex", pycomplex_to_complex)?;
    register_to_native("pystr_to_string", "str", pystr_to_string)?;
    register_to_native("pybytes_to_bytes", "bytes", pybytes_to_bytes)?;
    register_to_native("pybytearray_to_bytes", "bytearray", pybytearray_to_bytes)?;
    Ok(())
}
