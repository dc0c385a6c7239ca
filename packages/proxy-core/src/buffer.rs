//! Numeric-array buffers shared without copying.
//!
//! A `BufferChunk` is a descriptor: an address, a byte length and an element
//! type. The memory itself is kept alive by the chunk's container, which is
//! either a native allocation or whatever foreign object owns the bytes.

use std::any::Any;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::Arc;

use crate::complex::{Complex32, Complex64};
use crate::error::{Error, Result};

/// Element category of a `DType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    SignedInt,
    UnsignedInt,
    Float,
    ComplexInt,
    ComplexFloat,
}

const ELEMENT_TYPES: &[(&str, ElementKind, usize)] = &[
    ("int8", ElementKind::SignedInt, 1),
    ("int16", ElementKind::SignedInt, 2),
    ("int32", ElementKind::SignedInt, 4),
    ("int64", ElementKind::SignedInt, 8),
    ("uint8", ElementKind::UnsignedInt, 1),
    ("uint16", ElementKind::UnsignedInt, 2),
    ("uint32", ElementKind::UnsignedInt, 4),
    ("uint64", ElementKind::UnsignedInt, 8),
    ("float32", ElementKind::Float, 4),
    ("float64", ElementKind::Float, 8),
    ("complex_int8", ElementKind::ComplexInt, 2),
    ("complex_int16", ElementKind::ComplexInt, 4),
    ("complex_int32", ElementKind::ComplexInt, 8),
    ("complex_int64", ElementKind::ComplexInt, 16),
    ("complex_float32", ElementKind::ComplexFloat, 8),
    ("complex_float64", ElementKind::ComplexFloat, 16),
];

fn canonical_name(name: &str) -> &str {
    match name {
        "complex64" => "complex_float32",
        "complex128" => "complex_float64",
        "float" => "float32",
        "double" => "float64",
        other => other,
    }
}

/// Element type of a buffer: a scalar type name and a per-element dimension.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DType {
    name: &'static str,
    kind: ElementKind,
    element_size: usize,
    dimension: usize,
}

impl DType {
    /// Create a dtype from an element name and dimension.
    ///
    /// numpy's `complex64` and `complex128` are accepted as aliases.
    pub fn new(name: &str, dimension: usize) -> Result<Self> {
        let canonical = canonical_name(name.trim());
        let (name, kind, element_size) = ELEMENT_TYPES
            .iter()
            .copied()
            .find(|(n, _, _)| *n == canonical)
            .ok_or_else(|| Error::InvalidDType(name.to_string()))?;
        if dimension == 0 {
            return Err(Error::InvalidDType(format!("{},0", name)));
        }
        Ok(Self {
            name,
            kind,
            element_size,
            dimension,
        })
    }

    /// Parse `"name"` or `"name,dimension"`.
    ///
    /// ```rust
    /// use proxy_core::DType;
    ///
    /// let dtype = DType::parse("float32,4").unwrap();
    /// assert_eq!(dtype.dimension(), 4);
    /// assert_eq!(dtype.size(), 16);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(',') {
            Some((name, dimension)) => {
                let dimension = dimension
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidDType(s.to_string()))?;
                Self::new(name, dimension)
            }
            None => Self::new(s, 1),
        }
    }

    /// The dtype for a Rust element type.
    pub fn of<T: Element>() -> Self {
        let (name, kind, element_size) = ELEMENT_TYPES
            .iter()
            .copied()
            .find(|(n, _, _)| *n == T::DTYPE_NAME)
            .unwrap_or(("uint8", ElementKind::UnsignedInt, 1));
        Self {
            name,
            kind,
            element_size,
            dimension: 1,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Size in bytes of one scalar.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Size in bytes of one element (scalar size times dimension).
    pub fn size(&self) -> usize {
        self.element_size * self.dimension
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dimension == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{},{}", self.name, self.dimension)
        }
    }
}

impl fmt::Debug for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DType({})", self)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust scalar types that can view buffer memory.
pub trait Element: Copy + sealed::Sealed + 'static {
    const DTYPE_NAME: &'static str;
}

macro_rules! element {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {
                const DTYPE_NAME: &'static str = $name;
            }
        )*
    };
}

element! {
    i8 => "int8",
    i16 => "int16",
    i32 => "int32",
    i64 => "int64",
    u8 => "uint8",
    u16 => "uint16",
    u32 => "uint32",
    u64 => "uint64",
    f32 => "float32",
    f64 => "float64",
    Complex32 => "complex_float32",
    Complex64 => "complex_float64",
}

/// Zeroed heap memory owned by a native buffer.
///
/// Words are `UnsafeCell` because chunk clones hand out mutable views of
/// shared memory; callers of `as_mut_slice` uphold exclusivity.
struct NativeAllocation(Box<[UnsafeCell<u64>]>);

// SAFETY: the allocation is only reached through raw pointers whose
// aliasing is governed by the unsafe `BufferChunk::as_mut_slice` contract.
unsafe impl Sync for NativeAllocation {}

/// A span of memory and the object that keeps it alive.
#[derive(Clone)]
pub struct SharedBuffer {
    address: usize,
    length: usize,
    container: Arc<dyn Any + Send + Sync>,
}

impl SharedBuffer {
    /// Allocate `length` zeroed bytes (8-byte aligned).
    pub fn allocate(length: usize) -> Self {
        let words = length.div_ceil(8);
        let cells: Box<[UnsafeCell<u64>]> = (0..words).map(|_| UnsafeCell::new(0)).collect();
        let allocation = NativeAllocation(cells);
        let address = allocation.0.as_ptr() as usize;
        Self {
            address,
            length,
            container: Arc::new(allocation),
        }
    }

    /// Describe memory owned by `container`.
    ///
    /// # Safety
    ///
    /// `address..address + length` must stay valid for as long as
    /// `container` is alive.
    pub unsafe fn from_container(
        address: usize,
        length: usize,
        container: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            address,
            length,
            container,
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    /// Length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The object keeping the memory alive.
    pub fn container(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.container
    }
}

/// A typed view over a `SharedBuffer`.
#[derive(Clone)]
pub struct BufferChunk {
    buffer: SharedBuffer,
    dtype: DType,
}

impl BufferChunk {
    /// Allocate a zeroed chunk of `elements` elements.
    pub fn new(dtype: DType, elements: usize) -> Self {
        let buffer = SharedBuffer::allocate(elements * dtype.size());
        Self { buffer, dtype }
    }

    /// View existing memory as elements of `dtype`.
    pub fn from_shared(dtype: DType, buffer: SharedBuffer) -> Self {
        Self { buffer, dtype }
    }

    /// Allocate a chunk holding a copy of `values`.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let chunk = Self::new(DType::of::<T>(), values.len());
        // SAFETY: the chunk was just allocated and is not shared yet.
        if let Ok(dst) = unsafe { chunk.as_mut_slice::<T>() } {
            dst.copy_from_slice(values);
        }
        chunk
    }

    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn address(&self) -> usize {
        self.buffer.address
    }

    /// Length in bytes.
    pub fn length(&self) -> usize {
        self.buffer.length
    }

    /// Number of elements (each `dtype.size()` bytes).
    pub fn elements(&self) -> usize {
        match self.dtype.size() {
            0 => 0,
            size => self.buffer.length / size,
        }
    }

    fn check_element<T: Element>(&self) -> Result<usize> {
        if T::DTYPE_NAME != self.dtype.name {
            return Err(Error::mismatch(T::DTYPE_NAME, self.dtype.to_string()));
        }
        Ok(self.elements() * self.dtype.dimension)
    }

    /// View the memory as scalars of type `T`.
    ///
    /// Multi-dimensional elements are flattened, so the slice holds
    /// `elements() * dimension()` scalars.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        let len = self.check_element::<T>()?;
        if len == 0 {
            return Ok(&[]);
        }
        // SAFETY: the container keeps the span alive for the lifetime of
        // `self`, and the dtype check guarantees the element type.
        Ok(unsafe { std::slice::from_raw_parts(self.buffer.address as *const T, len) })
    }

    /// Mutable view of the memory as scalars of type `T`.
    ///
    /// # Safety
    ///
    /// Clones of a chunk share memory. The caller must ensure no other view
    /// of the same memory is used while the returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice<T: Element>(&self) -> Result<&mut [T]> {
        let len = self.check_element::<T>()?;
        if len == 0 {
            return Ok(&mut []);
        }
        Ok(std::slice::from_raw_parts_mut(
            self.buffer.address as *mut T,
            len,
        ))
    }
}

impl fmt::Debug for BufferChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferChunk")
            .field("dtype", &self.dtype)
            .field("elements", &self.elements())
            .field("address", &format_args!("{:#x}", self.buffer.address))
            .finish()
    }
}
