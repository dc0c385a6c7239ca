//! Error types shared by the host contract and every environment.

use thiserror::Error;

use crate::plugin::{PluginPath, PluginPathError};

/// Errors raised by proxy environments, conversions and blocks.
///
/// The first five variants are the bridge taxonomy: callers match on them to
/// tell a missing symbol from a missing converter from a foreign exception.
#[derive(Debug, Error)]
pub enum Error {
    /// A module or top-level name could not be resolved in the foreign runtime.
    #[error("symbol not found: {name}: {message}")]
    SymbolNotFound { name: String, message: String },

    /// No converter is registered for the requested direction and type.
    #[error("no converter from {from} to {to}")]
    NoConverter { from: String, to: String },

    /// The foreign call itself raised.
    #[error("{context}: {message}")]
    Execution { context: String, message: String },

    /// Marshaling failed in either direction.
    #[error("serialization failed: {message}")]
    Serialize { message: String },

    /// A method was dispatched to a block delegate with nothing bound.
    #[error("no foreign block bound for call: {method}")]
    UnboundDelegate { method: String },

    /// The block does not handle the named call.
    #[error("call not found: {0}")]
    CallNotFound(String),

    /// An object did not hold the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// No environment factory is registered under the name.
    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    /// Nothing is registered at the plugin path (or it has another type).
    #[error("plugin not found: {0}")]
    PluginNotFound(PluginPath),

    /// A data type name could not be parsed.
    #[error("invalid dtype: {0}")]
    InvalidDType(String),

    /// A plugin path failed validation.
    #[error(transparent)]
    Path(#[from] PluginPathError),

    /// Required configuration was missing or malformed.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The foreign runtime cannot be entered (for example after finalization).
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an execution error for a foreign call.
    pub fn execution(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Execution {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;
