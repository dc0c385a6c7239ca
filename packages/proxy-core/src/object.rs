//! The Object type - the host's generic value.
//!
//! Every value crossing a language boundary is expressed as an `Object`
//! first. Environments convert Objects into their own representation and
//! back; the `NativeType` of an Object is the key they dispatch on.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::buffer::BufferChunk;
use crate::complex::{Complex32, Complex64};
use crate::convert::FromObject;
use crate::error::Result;
use crate::proxy::Proxy;

/// A dynamically-typed host value.
///
/// # Design Notes
///
/// - Integer widths are kept distinct so a converter can be registered per
///   width; extraction through `convert` widens and narrows between them
/// - `Set` and `Map` use ordered collections, so `Object` has a total order:
///   variant first, then value (floats by `total_cmp`, proxies and opaque
///   values by identity)
/// - `Proxy` holds a value that lives in a foreign environment
/// - `Opaque` holds any other host value, keyed by its `TypeId`
#[derive(Clone, Debug, Default)]
pub enum Object {
    /// The empty object.
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Complex32(Complex32),
    Complex64(Complex64),
    /// UTF-8 string.
    String(String),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// Ordered sequence of objects.
    Vector(Vec<Object>),
    /// Set of objects.
    Set(BTreeSet<Object>),
    /// Mapping of object to object.
    Map(BTreeMap<Object, Object>),
    /// Numeric-array buffer shared without copying.
    Buffer(BufferChunk),
    /// A value owned by a foreign environment.
    Proxy(Proxy),
    /// Any other host value.
    Opaque(OpaqueObject),
}

/// The native type identity of an `Object`.
///
/// Conversion registries are keyed by this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeType {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex32,
    Complex64,
    String,
    Bytes,
    Vector,
    Set,
    Map,
    Buffer,
    Proxy,
    Opaque(TypeId),
}

impl NativeType {
    /// Short name used in diagnostics and registry paths.
    pub fn name(&self) -> &'static str {
        match self {
            NativeType::Null => "null",
            NativeType::Bool => "bool",
            NativeType::I8 => "sint8",
            NativeType::I16 => "sint16",
            NativeType::I32 => "sint32",
            NativeType::I64 => "sint64",
            NativeType::U8 => "uint8",
            NativeType::U16 => "uint16",
            NativeType::U32 => "uint32",
            NativeType::U64 => "uint64",
            NativeType::F32 => "float32",
            NativeType::F64 => "float64",
            NativeType::Complex32 => "complex64",
            NativeType::Complex64 => "complex128",
            NativeType::String => "string",
            NativeType::Bytes => "bytes",
            NativeType::Vector => "vector",
            NativeType::Set => "set",
            NativeType::Map => "map",
            NativeType::Buffer => "buffer_chunk",
            NativeType::Proxy => "proxy",
            NativeType::Opaque(_) => "opaque",
        }
    }
}

/// A host value of arbitrary type, shared by reference.
#[derive(Clone)]
pub struct OpaqueObject {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the held value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Address of the shared allocation; two clones share an identity.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.value) as *const () as usize
    }
}

impl fmt::Debug for OpaqueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>@{:#x}", self.type_name, self.identity())
    }
}

impl Object {
    /// Wrap any host value as an opaque object.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Object::Opaque(OpaqueObject::new(value))
    }

    /// Create a byte-sequence object.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Object::Bytes(value.into())
    }

    /// Check if this is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// The registry key for this object's type.
    pub fn native_type(&self) -> NativeType {
        match self {
            Object::Null => NativeType::Null,
            Object::Bool(_) => NativeType::Bool,
            Object::I8(_) => NativeType::I8,
            Object::I16(_) => NativeType::I16,
            Object::I32(_) => NativeType::I32,
            Object::I64(_) => NativeType::I64,
            Object::U8(_) => NativeType::U8,
            Object::U16(_) => NativeType::U16,
            Object::U32(_) => NativeType::U32,
            Object::U64(_) => NativeType::U64,
            Object::F32(_) => NativeType::F32,
            Object::F64(_) => NativeType::F64,
            Object::Complex32(_) => NativeType::Complex32,
            Object::Complex64(_) => NativeType::Complex64,
            Object::String(_) => NativeType::String,
            Object::Bytes(_) => NativeType::Bytes,
            Object::Vector(_) => NativeType::Vector,
            Object::Set(_) => NativeType::Set,
            Object::Map(_) => NativeType::Map,
            Object::Buffer(_) => NativeType::Buffer,
            Object::Proxy(_) => NativeType::Proxy,
            Object::Opaque(o) => NativeType::Opaque(o.type_id()),
        }
    }

    /// Human-readable type name, including the concrete type of opaque values.
    pub fn type_name(&self) -> String {
        match self {
            Object::Opaque(o) => o.type_name().to_string(),
            other => other.native_type().name().to_string(),
        }
    }

    /// Extract a typed value, widening or narrowing numbers as needed.
    pub fn convert<T: FromObject>(&self) -> Result<T> {
        T::from_object(self)
    }

    /// Borrow the proxy held by this object, if any.
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Object::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow the opaque value if it holds a `T`.
    pub fn downcast_opaque<T: Any>(&self) -> Option<&T> {
        match self {
            Object::Opaque(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Object::Null => 0,
            Object::Bool(_) => 1,
            Object::I8(_) => 2,
            Object::I16(_) => 3,
            Object::I32(_) => 4,
            Object::I64(_) => 5,
            Object::U8(_) => 6,
            Object::U16(_) => 7,
            Object::U32(_) => 8,
            Object::U64(_) => 9,
            Object::F32(_) => 10,
            Object::F64(_) => 11,
            Object::Complex32(_) => 12,
            Object::Complex64(_) => 13,
            Object::String(_) => 14,
            Object::Bytes(_) => 15,
            Object::Vector(_) => 16,
            Object::Set(_) => 17,
            Object::Map(_) => 18,
            Object::Buffer(_) => 19,
            Object::Proxy(_) => 20,
            Object::Opaque(_) => 21,
        }
    }
}

impl Ord for Object {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Object::Null, Object::Null) => Ordering::Equal,
            (Object::Bool(a), Object::Bool(b)) => a.cmp(b),
            (Object::I8(a), Object::I8(b)) => a.cmp(b),
            (Object::I16(a), Object::I16(b)) => a.cmp(b),
            (Object::I32(a), Object::I32(b)) => a.cmp(b),
            (Object::I64(a), Object::I64(b)) => a.cmp(b),
            (Object::U8(a), Object::U8(b)) => a.cmp(b),
            (Object::U16(a), Object::U16(b)) => a.cmp(b),
            (Object::U32(a), Object::U32(b)) => a.cmp(b),
            (Object::U64(a), Object::U64(b)) => a.cmp(b),
            (Object::F32(a), Object::F32(b)) => a.total_cmp(b),
            (Object::F64(a), Object::F64(b)) => a.total_cmp(b),
            (Object::Complex32(a), Object::Complex32(b)) => {
                a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im))
            }
            (Object::Complex64(a), Object::Complex64(b)) => {
                a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im))
            }
            (Object::String(a), Object::String(b)) => a.cmp(b),
            (Object::Bytes(a), Object::Bytes(b)) => a.cmp(b),
            (Object::Vector(a), Object::Vector(b)) => a.cmp(b),
            (Object::Set(a), Object::Set(b)) => a.cmp(b),
            (Object::Map(a), Object::Map(b)) => a.cmp(b),
            (Object::Buffer(a), Object::Buffer(b)) => a
                .address()
                .cmp(&b.address())
                .then(a.length().cmp(&b.length()))
                .then_with(|| a.dtype().cmp(b.dtype())),
            (Object::Proxy(a), Object::Proxy(b)) => a.identity().cmp(&b.identity()),
            (Object::Opaque(a), Object::Opaque(b)) => a.identity().cmp(&b.identity()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Object {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Object {}

// Conversion from common types

macro_rules! object_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Object {
                fn from(v: $t) -> Self {
                    Object::$variant(v)
                }
            }
        )*
    };
}

object_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Complex32 => Complex32,
    Complex64 => Complex64,
    String => String,
    BTreeSet<Object> => Set,
    BTreeMap<Object, Object> => Map,
    BufferChunk => Buffer,
    Proxy => Proxy,
}

impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Object::String(v.to_string())
    }
}

impl<T: Into<Object>> From<Vec<T>> for Object {
    fn from(v: Vec<T>) -> Self {
        Object::Vector(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;

    #[test]
    fn native_type_per_width() {
        assert_eq!(Object::from(1i8).native_type(), NativeType::I8);
        assert_eq!(Object::from(1u64).native_type(), NativeType::U64);
        assert_eq!(Object::from(1.0f32).native_type(), NativeType::F32);
        assert_eq!(Object::from("x").native_type(), NativeType::String);
        assert_eq!(Object::Null.native_type(), NativeType::Null);
    }

    #[test]
    fn opaque_type_identity() {
        struct Marker;
        let object = Object::opaque(Marker);
        assert_eq!(
            object.native_type(),
            NativeType::Opaque(TypeId::of::<Marker>())
        );
        assert!(object.downcast_opaque::<Marker>().is_some());
        assert!(object.downcast_opaque::<String>().is_none());
        assert!(object.type_name().ends_with("Marker"));
    }

    #[test]
    fn opaque_clones_share_identity() {
        let a = Object::opaque(5u128);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Object::opaque(5u128));
    }

    #[test]
    fn ordering_is_by_variant_then_value() {
        assert!(Object::from(1i64) < Object::from(2i64));
        assert!(Object::Null < Object::from(false));
        // different widths are different values
        assert_ne!(Object::from(1i32), Object::from(1i64));
        assert_eq!(Object::from(f64::NAN), Object::from(f64::NAN));
    }

    #[test]
    fn objects_key_sets_and_maps() {
        let set: BTreeSet<Object> = [Object::from("hi"), Object::from(1i64), Object::from("hi")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Object::from(1i64)));

        let map = btree! {
            Object::from("hi") => Object::from("bye"),
            Object::from(1i64) => Object::from(2i64),
        };
        let object = Object::Map(map);
        match &object {
            Object::Map(m) => {
                assert_eq!(m.get(&Object::from("hi")), Some(&Object::from("bye")));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn vec_into_vector() {
        let object = Object::from(vec![1i32, 2, 3]);
        assert_eq!(
            object,
            Object::Vector(vec![Object::I32(1), Object::I32(2), Object::I32(3)])
        );
    }
}
