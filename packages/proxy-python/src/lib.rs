//! Embedded Python environment for `proxy-core`.
//!
//! This crate starts (or joins) the process's Python interpreter and exposes
//! it to the host as the `python` proxy environment:
//!
//! - [`PythonEnvironment`] resolves symbols, converts values in both
//!   directions and marshals them.
//! - [`ForeignHandle`] owns one Python object on behalf of a [`proxy_core::Proxy`].
//! - The converter tables in [`registry`] map host types to Python types and
//!   runtime type names back to host types.
//! - [`ScriptBlock`] lets a Python object implement a processing block, and
//!   [`ScriptLoader`] registers block factories for Python scripts.
//!
//! Call [`register`] once at startup to publish the environment factory and
//! the block factory.
//!
//! ```no_run
//! use proxy_core::{make_environment, EnvironmentArgs, Object};
//!
//! proxy_python::register().unwrap();
//! let env = make_environment("python", &EnvironmentArgs::new()).unwrap();
//! let math = env.find_proxy("math").unwrap();
//! let root = math.call_with("sqrt", &[Object::F64(2.0)]).unwrap();
//! assert!((root.convert::<f64>().unwrap() - 2f64.sqrt()).abs() < 1e-12);
//! ```

mod config;
mod convert;
mod delegate;
mod environment;
mod error;
mod handle;
mod info;
mod loader;
mod lock;
mod ports;
pub mod registry;
mod runtime;

use std::sync::{Arc, Mutex, PoisonError};

use proxy_core::{
    register_environment, Block, BlockFactory, BlockRegistry, EnvironmentArgs, EnvironmentFactory,
    Object, PluginPath, PluginRegistry, ProxyEnvironment,
};

pub use config::BridgeConfig;
pub use convert::{runtime_type_name, BufferView, HostObject};
pub use delegate::{ScriptBlock, BIND_CALL, PROPAGATE_HOOK};
pub use environment::PythonEnvironment;
pub use error::Result;
pub use handle::{ForeignHandle, Ownership};
pub use info::{python_info, INFO_PATH};
pub use loader::{ScriptLoader, ScriptSpec};
pub use lock::held_by_current_thread;
pub use ports::Ports;
pub use registry::{Converter, ToForeignFn, ToNativeFn};
pub use runtime::{acquire, lease_count, shutdown, RuntimeLease, ShutdownOutcome};

/// Name the environment factory is registered under.
pub const ENVIRONMENT_NAME: &str = "python";

/// Plugin path of the unbound script block.
pub const BLOCK_PATH: &str = "/blocks/python_block";

/// Signature of the interpreter description published at [`INFO_PATH`].
pub type InfoFn = fn() -> Result<serde_json::Value>;

/// Register the `python` environment factory, the script block factory and
/// the interpreter description.
///
/// Safe to call more than once; only the first call registers. Call it at
/// startup, before other threads use the registries.
pub fn register() -> Result<()> {
    static REGISTERED: Mutex<bool> = Mutex::new(false);
    let mut registered = REGISTERED.lock().unwrap_or_else(PoisonError::into_inner);
    if *registered {
        return Ok(());
    }

    convert::register_builtin()?;
    let environment: EnvironmentFactory =
        Arc::new(|args: &EnvironmentArgs| -> Result<Arc<dyn ProxyEnvironment>> {
            let config = BridgeConfig::from_args(args)?;
            let env: Arc<dyn ProxyEnvironment> = PythonEnvironment::new(config)?;
            Ok(env)
        });
    register_environment(ENVIRONMENT_NAME, environment)?;

    let block: BlockFactory = Arc::new(|_args: &[Object]| -> Result<Box<dyn Block>> {
        Ok(Box::new(ScriptBlock::new()))
    });
    BlockRegistry::register(BLOCK_PATH, block)?;

    let info: InfoFn = python_info;
    PluginRegistry::add(PluginPath::parse(INFO_PATH)?, info);

    tracing::debug!("python plugins registered");
    *registered = true;
    Ok(())
}
