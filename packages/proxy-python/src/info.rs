//! Description of the running interpreter, published as a device entry.

use std::sync::OnceLock;

use proxy_core::Result;
use pyo3::prelude::*;
use serde_json::{json, Value};

use crate::error::PyResultExt;
use crate::lock::with_lock;
use crate::runtime;

/// Plugin path of the interpreter description.
pub const INFO_PATH: &str = "/devices/python/info";

/// Interpreter facts: paths, implementation and version.
///
/// Computed once and cached. Starts the interpreter when no environment
/// exists yet.
pub fn python_info() -> Result<Value> {
    static INFO: OnceLock<Value> = OnceLock::new();
    if let Some(info) = INFO.get() {
        return Ok(info.clone());
    }
    let _lease = runtime::acquire()?;
    let info = with_lock(collect)?;
    Ok(INFO.get_or_init(|| info).clone())
}

fn collect(py: Python<'_>) -> Result<Value> {
    let context = || "python info".to_string();
    let sys = PyModule::import_bound(py, "sys").or_execution(context)?;
    let attr = |name: &str| -> Result<String> {
        sys.getattr(name)
            .and_then(|value| value.str())
            .map(|value| value.to_string())
            .or_execution(context)
    };

    let implementation: String = sys
        .getattr("implementation")
        .and_then(|imp| imp.getattr("name"))
        .and_then(|name| name.extract())
        .or_execution(context)?;
    let cache_tag: Option<String> = sys
        .getattr("implementation")
        .and_then(|imp| imp.getattr("cache_tag"))
        .and_then(|tag| tag.extract())
        .or_execution(context)?;

    let version_info = sys.getattr("version_info").or_execution(context)?;
    let field = |name: &str| -> Result<u32> {
        version_info
            .getattr(name)
            .and_then(|value| value.extract())
            .or_execution(context)
    };
    let major = field("major")?;
    let minor = field("minor")?;
    let micro = field("micro")?;
    let serial = field("serial")?;
    let release_level: String = version_info
        .getattr("releaselevel")
        .and_then(|v| v.extract())
        .or_execution(context)?;
    let hexversion: u64 = sys
        .getattr("hexversion")
        .and_then(|v| v.extract())
        .or_execution(context)?;

    let version = attr("version")?;
    let version_string = version.split(' ').next().unwrap_or_default().to_string();

    Ok(json!({
        "Prefix": attr("prefix")?,
        "Exec Prefix": attr("exec_prefix")?,
        "Executable": attr("executable")?,
        "Implementation": implementation,
        "Cache Tag": cache_tag,
        "Version Info": {
            "Major": major,
            "Minor": minor,
            "Patch": micro,
            "Release Level": release_level,
            "Serial": serial,
            "Version String": version_string,
            "Version Hex": format!("0x{:x}", hexversion),
        },
    }))
}
