//! Configuration for the Python environment.

use std::path::PathBuf;

use proxy_core::{EnvironmentArgs, Error, Result};
use serde::Deserialize;

/// Configuration for a `PythonEnvironment`.
///
/// Only the first environment created in a process applies the site setup
/// (search path, support module, bytecode policy).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory appended to `sys.path` holding the support package.
    pub support_path: PathBuf,

    /// Module imported eagerly at startup. `None` skips the import.
    pub support_module: Option<String>,

    /// Allow the interpreter to write `.pyc` files.
    pub write_bytecode: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            support_path: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/python")),
            support_module: Some("proxy_bridge".to_string()),
            write_bytecode: false,
        }
    }
}

impl BridgeConfig {
    /// Read overrides from environment factory arguments.
    ///
    /// Recognized keys are `support_path`, `support_module` (empty or
    /// `none` disables the import) and `write_bytecode`.
    pub fn from_args(args: &EnvironmentArgs) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = args.get("support_path") {
            config.support_path = PathBuf::from(path);
        }
        if let Some(module) = args.get("support_module") {
            config.support_module = match module.trim() {
                "" | "none" => None,
                name => Some(name.to_string()),
            };
        }
        if let Some(flag) = args.get("write_bytecode") {
            config.write_bytecode = flag.trim().parse().map_err(|_| {
                Error::config(format!("write_bytecode must be true or false, got '{}'", flag))
            })?;
        }
        Ok(config)
    }

    /// Parse a JSON configuration document; missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::config(err.to_string()))
    }
}
