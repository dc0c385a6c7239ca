//! Zero-copy numeric arrays and numpy scalars.
//!
//! Outward, a `BufferChunk` is exposed through `__array_interface__` on a
//! `BufferView`; `numpy.asarray` over the view shares the chunk's memory and
//! keeps the view (and so the chunk) alive as the array's base. Inward, the
//! chunk's container is a handle to the array, so the array lives as long
//! as the chunk does.

use std::sync::Arc;

use proxy_core::{
    BufferChunk, DType, ElementKind, Error, NativeType, Object, Result, SharedBuffer,
};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};

use crate::environment::PythonEnvironment;
use crate::error::PyResultExt;
use crate::registry::{register_to_foreign, register_to_native};

/// numpy scalar types, converted by `.item()`.
const NUMPY_SCALARS: &[(&str, &str)] = &[
    ("numpy_bool_to_object", "numpy.bool_"),
    ("numpy_bool2_to_object", "numpy.bool"),
    ("numpy_int8_to_object", "numpy.int8"),
    ("numpy_int16_to_object", "numpy.int16"),
    ("numpy_int32_to_object", "numpy.int32"),
    ("numpy_int64_to_object", "numpy.int64"),
    ("numpy_longlong_to_object", "numpy.longlong"),
    ("numpy_uint8_to_object", "numpy.uint8"),
    ("numpy_uint16_to_object", "numpy.uint16"),
    ("numpy_uint32_to_object", "numpy.uint32"),
    ("numpy_uint64_to_object", "numpy.uint64"),
    ("numpy_ulonglong_to_object", "numpy.ulonglong"),
    ("numpy_float16_to_object", "numpy.float16"),
    ("numpy_float32_to_object", "numpy.float32"),
    ("numpy_float64_to_object", "numpy.float64"),
    ("numpy_complex64_to_object", "numpy.complex64"),
    ("numpy_complex128_to_object", "numpy.complex128"),
];

fn import_numpy(py: Python<'_>) -> Result<Bound<'_, PyModule>> {
    PyModule::import_bound(py, "numpy").or_execution(|| "import(numpy)".to_string())
}

/// The `__array_interface__` type string for a dtype, e.g. `<f4`.
///
/// numpy has no complex integer type: complex_intN maps to intN and the
/// array gets a trailing axis holding the two components.
pub fn typestr(dtype: &DType) -> String {
    let (kind, size) = match dtype.kind() {
        ElementKind::SignedInt => ('i', dtype.element_size()),
        ElementKind::UnsignedInt => ('u', dtype.element_size()),
        ElementKind::Float => ('f', dtype.element_size()),
        ElementKind::ComplexFloat => ('c', dtype.element_size()),
        ElementKind::ComplexInt => ('i', dtype.element_size() / 2),
    };
    let order = if size == 1 {
        '|'
    } else if cfg!(target_endian = "little") {
        '<'
    } else {
        '>'
    };
    format!("{}{}{}", order, kind, size)
}

/// The array shape for `elements` elements of `dtype`.
fn array_shape(dtype: &DType, elements: usize) -> Vec<usize> {
    let mut shape = vec![elements];
    if dtype.dimension() > 1 {
        shape.push(dtype.dimension());
    }
    if dtype.kind() == ElementKind::ComplexInt {
        shape.push(2);
    }
    shape
}

/// A `BufferChunk` exposed to Python through the array interface.
#[pyclass(module = "proxy_bridge", name = "BufferView", frozen)]
pub struct BufferView {
    chunk: BufferChunk,
    typestr: String,
}

impl BufferView {
    pub fn new(chunk: BufferChunk) -> Self {
        let typestr = typestr(chunk.dtype());
        Self { chunk, typestr }
    }

    pub fn chunk(&self) -> &BufferChunk {
        &self.chunk
    }
}

#[pymethods]
impl BufferView {
    #[getter(__array_interface__)]
    fn array_interface<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let shape = PyTuple::new_bound(py, array_shape(self.chunk.dtype(), self.chunk.elements()));
        let interface = PyDict::new_bound(py);
        interface.set_item("shape", shape)?;
        interface.set_item("typestr", &self.typestr)?;
        interface.set_item("data", (self.chunk.address(), false))?;
        interface.set_item("version", 3)?;
        Ok(interface)
    }

    fn __len__(&self) -> usize {
        self.chunk.elements()
    }
}

fn buffer_chunk_to_numpy_array<'py>(
    _env: &PythonEnvironment,
    py: Python<'py>,
    object: &Object,
) -> Result<Bound<'py, PyAny>> {
    let Object::Buffer(chunk) = object else {
        return Err(Error::mismatch("buffer_chunk", object.type_name()));
    };
    let numpy = import_numpy(py)?;
    let view = Bound::new(py, BufferView::new(chunk.clone()))
        .or_execution(|| "wrap(BufferView)".to_string())?;
    numpy
        .call_method1("asarray", (view,))
        .or_execution(|| "numpy.asarray".to_string())
}

fn numpy_array_to_buffer_chunk(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let py = obj.py();
    let context = || "convert(numpy.ndarray)".to_string();

    let contiguous: bool = obj
        .getattr("flags")
        .and_then(|flags| flags.get_item("C_CONTIGUOUS"))
        .and_then(|flag| flag.extract())
        .or_execution(context)?;
    let array = if contiguous {
        obj.clone()
    } else {
        import_numpy(py)?
            .call_method1("ascontiguousarray", (obj,))
            .or_execution(context)?
    };

    let (address, _read_only): (usize, bool) = array
        .getattr("__array_interface__")
        .and_then(|interface| interface.get_item("data"))
        .and_then(|data| data.extract())
        .or_execution(context)?;
    let nbytes: usize = array
        .getattr("nbytes")
        .and_then(|n| n.extract())
        .or_execution(context)?;
    let dtype_name: String = array
        .getattr("dtype")
        .and_then(|dtype| dtype.getattr("name"))
        .and_then(|name| name.extract())
        .or_execution(context)?;
    let shape: Vec<usize> = array
        .getattr("shape")
        .and_then(|shape| shape.extract())
        .or_execution(context)?;
    let dimension = match shape.get(1) {
        Some(d) if shape.len() >= 2 && *d > 0 => *d,
        _ => 1,
    };
    let dtype = DType::new(&dtype_name, dimension)?;

    let holder = env.wrap(array.unbind())?;
    // SAFETY: the array owns the memory and the holder keeps the array alive
    // for as long as the buffer exists.
    let buffer = unsafe { SharedBuffer::from_container(address, nbytes, Arc::new(holder)) };
    Ok(Object::Buffer(BufferChunk::from_shared(dtype, buffer)))
}

fn numpy_scalar_to_object(env: &PythonEnvironment, obj: &Bound<'_, PyAny>) -> Result<Object> {
    let item = obj
        .call_method0("item")
        .or_execution(|| "convert(numpy scalar)".to_string())?;
    env.py_to_object(&item)
}

pub(super) fn register() -> Result<()> {
    register_to_foreign(
        "buffer_chunk_to_numpy_array",
        NativeType::Buffer,
        buffer_chunk_to_numpy_array,
    )?;
    register_to_native(
        "numpy_array_to_buffer_chunk",
        "numpy.ndarray",
        numpy_array_to_buffer_chunk,
    )?;
    for &(description, type_name) in NUMPY_SCALARS {
        register_to_native(description, type_name, numpy_scalar_to_object)?;
    }
    Ok(())
}
