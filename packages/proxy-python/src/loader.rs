//! Registering Python script blocks from configuration.
//!
//! A configuration names a root directory, a module and a factory function.
//! Each configured factory path becomes a block factory that imports the
//! module, calls the function with the block's arguments and binds the
//! returned object to a `ScriptBlock`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proxy_core::{Block, BlockFactory, BlockRegistry, Error, Object, PluginPath, Result};

use crate::delegate::ScriptBlock;
use crate::environment::PythonEnvironment;
use crate::handle::ForeignHandle;

/// A parsed script block configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub root_dir: PathBuf,
    pub module: String,
    pub function: String,
    /// Documentation sources, resolved against `root_dir`. Recorded only.
    pub doc_sources: Vec<PathBuf>,
    /// Block factory paths to register.
    pub factories: Vec<String>,
}

fn list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ScriptSpec {
    /// Parse the configuration keys `root_dir` (or `conf_file_path`, whose
    /// directory is used), `module`, `function`, `doc_sources` and
    /// `factories`.
    ///
    /// Without `factories`, one factory is derived from the module and
    /// function names: `/blocks/<module path>/<function>`.
    pub fn from_config(config: &BTreeMap<String, String>) -> Result<Self> {
        let root_dir = match (config.get("root_dir"), config.get("conf_file_path")) {
            (Some(root), _) => PathBuf::from(root),
            (None, Some(conf)) => Path::new(conf)
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    Error::config(format!("conf_file_path has no directory: {}", conf))
                })?,
            (None, None) => return Err(Error::config("missing root_dir or conf_file_path")),
        };
        let module = config
            .get("module")
            .cloned()
            .ok_or_else(|| Error::config("missing module"))?;
        let function = config
            .get("function")
            .cloned()
            .ok_or_else(|| Error::config("missing function"))?;

        let doc_sources = list(config.get("doc_sources"))
            .into_iter()
            .map(|source| root_dir.join(source))
            .collect();

        let mut factories = list(config.get("factories"));
        if factories.is_empty() {
            factories.push(format!("/blocks/{}/{}", module.replace('.', "/"), function));
        }

        Ok(Self {
            root_dir,
            module,
            function,
            doc_sources,
            factories,
        })
    }

    /// Build a block bound to a fresh Python object.
    pub fn make_block(&self, args: &[Object]) -> Result<ScriptBlock> {
        let env = PythonEnvironment::shared()?;
        env.append_search_path(&self.root_dir)?;
        let module = env.find_symbol(&self.module)?;
        let module = module
            .downcast_handle::<ForeignHandle>()
            .ok_or_else(|| Error::mismatch("python module", module.class_name()))?;
        let target = module.call_with_objects(&self.function, args)?;
        let mut block = ScriptBlock::new();
        block.bind(target)?;
        Ok(block)
    }
}

/// Registers script block factories.
pub struct ScriptLoader;

impl ScriptLoader {
    /// Register one block factory per configured factory path.
    ///
    /// Returns the registered plugin paths.
    pub fn load(config: &BTreeMap<String, String>) -> Result<Vec<PluginPath>> {
        let spec = Arc::new(ScriptSpec::from_config(config)?);
        if !spec.doc_sources.is_empty() {
            tracing::debug!(sources = ?spec.doc_sources, "documentation sources recorded");
        }

        let mut registered = Vec::with_capacity(spec.factories.len());
        for path in &spec.factories {
            let factory_spec = Arc::clone(&spec);
            let factory: BlockFactory =
                Arc::new(move |args: &[Object]| -> Result<Box<dyn Block>> {
                    Ok(Box::new(factory_spec.make_block(args)?) as Box<dyn Block>)
                });
            let path = BlockRegistry::register(path, factory)?;
            tracing::info!(
                %path,
                module = %spec.module,
                function = %spec.function,
                "script block registered"
            );
            registered.push(path);
        }
        Ok(registered)
    }
}
