//! Complex numbers carried by `Object`.

use std::fmt;

/// A complex number with real and imaginary parts of type `T`.
///
/// The layout is `#[repr(C)]` so that a slice of complex values has the same
/// memory layout as interleaved `(re, im)` pairs in a numeric buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

/// Single-precision complex.
pub type Complex32 = Complex<f32>;

/// Double-precision complex.
pub type Complex64 = Complex<f64>;

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl<T: fmt::Display> fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}+{}j)", self.re, self.im)
    }
}
