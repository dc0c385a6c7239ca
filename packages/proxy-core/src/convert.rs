//! Typed extraction from `Object`.
//!
//! Numeric extraction is deliberately loose about the source width: a
//! foreign integer comes back as `I64`, or as `U64` when it overflowed the
//! signed range, and callers ask for the width they want.

use std::collections::{BTreeMap, BTreeSet};

use crate::buffer::BufferChunk;
use crate::complex::{Complex32, Complex64};
use crate::error::{Error, Result};
use crate::object::Object;
use crate::proxy::Proxy;

/// Trait for extracting Rust values out of an `Object`.
pub trait FromObject: Sized {
    /// # Errors
    ///
    /// Returns `Error::TypeMismatch` if the object does not hold a compatible
    /// value, including integers outside the target range.
    fn from_object(object: &Object) -> Result<Self>;
}

fn integer_of(object: &Object) -> Option<i128> {
    Some(match object {
        Object::Bool(v) => *v as i128,
        Object::I8(v) => *v as i128,
        Object::I16(v) => *v as i128,
        Object::I32(v) => *v as i128,
        Object::I64(v) => *v as i128,
        Object::U8(v) => *v as i128,
        Object::U16(v) => *v as i128,
        Object::U32(v) => *v as i128,
        Object::U64(v) => *v as i128,
        _ => return None,
    })
}

fn float_of(object: &Object) -> Option<f64> {
    match object {
        Object::F32(v) => Some(*v as f64),
        Object::F64(v) => Some(*v),
        other => integer_of(other).map(|v| v as f64),
    }
}

macro_rules! integer_from_object {
    ($($t:ty),*) => {
        $(
            impl FromObject for $t {
                fn from_object(object: &Object) -> Result<Self> {
                    let value = integer_of(object)
                        .ok_or_else(|| Error::mismatch(stringify!($t), object.type_name()))?;
                    <$t>::try_from(value).map_err(|_| {
                        Error::mismatch(stringify!($t), format!("{} (out of range)", value))
                    })
                }
            }
        )*
    };
}

integer_from_object!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl FromObject for f64 {
    fn from_object(object: &Object) -> Result<Self> {
        float_of(object).ok_or_else(|| Error::mismatch("f64", object.type_name()))
    }
}

impl FromObject for f32 {
    fn from_object(object: &Object) -> Result<Self> {
        float_of(object)
            .map(|v| v as f32)
            .ok_or_else(|| Error::mismatch("f32", object.type_name()))
    }
}

impl FromObject for Complex64 {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Complex64(c) => Ok(*c),
            Object::Complex32(c) => Ok(Complex64::new(c.re as f64, c.im as f64)),
            other => float_of(other)
                .map(|re| Complex64::new(re, 0.0))
                .ok_or_else(|| Error::mismatch("complex128", other.type_name())),
        }
    }
}

impl FromObject for Complex32 {
    fn from_object(object: &Object) -> Result<Self> {
        let c = Complex64::from_object(object)
            .map_err(|_| Error::mismatch("complex64", object.type_name()))?;
        Ok(Complex32::new(c.re as f32, c.im as f32))
    }
}

impl FromObject for bool {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Bool(b) => Ok(*b),
            other => Err(Error::mismatch("bool", other.type_name())),
        }
    }
}

impl FromObject for String {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::String(s) => Ok(s.clone()),
            other => Err(Error::mismatch("string", other.type_name())),
        }
    }
}

impl FromObject for Object {
    fn from_object(object: &Object) -> Result<Self> {
        Ok(object.clone())
    }
}

impl<T: FromObject> FromObject for Vec<T> {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Vector(items) => items.iter().map(T::from_object).collect(),
            Object::Bytes(bytes) => bytes
                .iter()
                .map(|b| T::from_object(&Object::U8(*b)))
                .collect(),
            other => Err(Error::mismatch("vector", other.type_name())),
        }
    }
}

impl FromObject for BTreeSet<Object> {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Set(set) => Ok(set.clone()),
            Object::Vector(items) => Ok(items.iter().cloned().collect()),
            other => Err(Error::mismatch("set", other.type_name())),
        }
    }
}

impl FromObject for BTreeMap<Object, Object> {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Map(map) => Ok(map.clone()),
            other => Err(Error::mismatch("map", other.type_name())),
        }
    }
}

impl FromObject for BufferChunk {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Buffer(chunk) => Ok(chunk.clone()),
            other => Err(Error::mismatch("buffer_chunk", other.type_name())),
        }
    }
}

impl FromObject for Proxy {
    fn from_object(object: &Object) -> Result<Self> {
        match object {
            Object::Proxy(proxy) => Ok(proxy.clone()),
            other => Err(Error::mismatch("proxy", other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_widen_and_narrow() {
        let object = Object::I64(-5);
        assert_eq!(object.convert::<i8>().unwrap(), -5);
        assert_eq!(object.convert::<i32>().unwrap(), -5);
        assert!(object.convert::<u32>().is_err());

        let big = Object::U64(u64::MAX);
        assert_eq!(big.convert::<u64>().unwrap(), u64::MAX);
        assert!(big.convert::<i64>().is_err());
    }

    #[test]
    fn integer_range_errors_are_mismatches() {
        let err = Object::I64(300).convert::<u8>().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn floats_accept_integers() {
        assert_eq!(Object::I32(3).convert::<f64>().unwrap(), 3.0);
        assert_eq!(Object::F64(0.5).convert::<f32>().unwrap(), 0.5f32);
        assert!(Object::from("x").convert::<f64>().is_err());
    }

    #[test]
    fn complex_widths() {
        let c = Object::Complex64(Complex64::new(1.0, -2.0));
        assert_eq!(c.convert::<Complex32>().unwrap(), Complex32::new(1.0, -2.0));
        assert_eq!(
            Object::F64(4.0).convert::<Complex64>().unwrap(),
            Complex64::new(4.0, 0.0)
        );
    }

    #[test]
    fn vectors_convert_elementwise() {
        let object = Object::Vector(vec![Object::I64(1), Object::I64(2)]);
        assert_eq!(object.convert::<Vec<i16>>().unwrap(), vec![1i16, 2]);
        assert!(Object::Vector(vec![Object::from("a")])
            .convert::<Vec<i16>>()
            .is_err());
    }

    #[test]
    fn bytes_as_vec_u8() {
        let object = Object::bytes(vec![1u8, 2, 3]);
        assert_eq!(object.convert::<Vec<u8>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bool_is_strict() {
        assert!(Object::Bool(true).convert::<bool>().unwrap());
        assert!(Object::I64(1).convert::<bool>().is_err());
    }
}
