//! Proxy Core: the host side of a language bridge.
//!
//! This crate defines the contract that foreign-language environments plug
//! into. Nothing here knows about a particular embedded runtime:
//!
//! - `Object`: the generic host value (scalars, containers, buffers, proxies)
//! - `Proxy`: a clonable handle to a value living in some foreign environment
//! - `ProxyEnvironment`: one binding to a foreign runtime, created by name
//! - `PluginPath` / `PluginRegistry`: the process-wide plugin table
//! - `BufferChunk`: numeric-array descriptor shared without copying
//! - `Block`: the polymorphic processing-block contract
//!
//! # Example
//!
//! ```rust
//! use proxy_core::Object;
//!
//! let value = Object::from(42i32);
//! let widened: i64 = value.convert().unwrap();
//! assert_eq!(widened, 42);
//! ```

mod block;
mod buffer;
mod complex;
mod convert;
mod error;
mod object;
mod plugin;
mod proxy;

pub use block::{
    propagate_labels_default, Block, BlockFactory, BlockId, BlockRegistry, BlockState, InputPort,
    Label, OutputPort,
};
pub use buffer::{BufferChunk, DType, Element, ElementKind, SharedBuffer};
pub use complex::{Complex, Complex32, Complex64};
pub use convert::FromObject;
pub use error::{Error, Result};
pub use object::{NativeType, Object, OpaqueObject};
pub use plugin::{PluginPath, PluginPathError, PluginRegistry};
pub use proxy::{
    make_environment, register_environment, EnvironmentArgs, EnvironmentFactory, EnvironmentId,
    Proxy, ProxyEnvironment, ProxyHandle,
};
