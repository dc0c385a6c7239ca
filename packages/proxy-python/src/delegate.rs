//! A processing block implemented by a Python object.
//!
//! `ScriptBlock` forwards lifecycle calls and named calls to the bound
//! Python object. Label propagation calls the object's `_propagateLabels`
//! hook with the block's `Ports` first; labels the override posts reach the
//! output ports, and the default behavior runs when the hook reports that
//! no override exists.

use proxy_core::{
    propagate_labels_default, Block, BlockId, BlockState, Error, InputPort, Label, Object,
    OutputPort, Proxy, Result,
};
use pyo3::prelude::*;

use crate::error::PyResultExt;
use crate::handle::ForeignHandle;
use crate::lock::with_lock;
use crate::ports::Ports;

/// The call that binds the Python object to the block.
pub const BIND_CALL: &str = "_bind_target";

/// Name of the label propagation hook on the Python side.
pub const PROPAGATE_HOOK: &str = "_propagateLabels";

/// Delegates the block contract to a Python object.
pub struct ScriptBlock {
    id: BlockId,
    state: BlockState,
    target: Option<Proxy>,
}

impl Default for ScriptBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBlock {
    /// An unbound block.
    pub fn new() -> Self {
        Self {
            id: BlockId::new(),
            state: BlockState::Unbound,
            target: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn target(&self) -> Option<&Proxy> {
        self.target.as_ref()
    }

    /// Attach the Python object that implements this block.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when `target` is not a Python proxy.
    pub fn bind(&mut self, target: Proxy) -> Result<()> {
        if target.downcast_handle::<ForeignHandle>().is_none() {
            return Err(Error::mismatch("python proxy", target.environment().name()));
        }
        tracing::debug!(block = %self.id, class = %target.class_name(), "script block bound");
        self.target = Some(target);
        if self.state == BlockState::Unbound {
            self.state = BlockState::Bound;
        }
        Ok(())
    }

    fn handle(&self, method: &str) -> Result<&ForeignHandle> {
        self.target
            .as_ref()
            .and_then(|target| target.downcast_handle::<ForeignHandle>())
            .ok_or_else(|| Error::UnboundDelegate {
                method: method.to_string(),
            })
    }

    fn forward(&self, method: &str) -> Result<()> {
        let target = self.handle(method)?;
        with_lock(|py| {
            target
                .bind(py)?
                .call_method0(method)
                .or_execution(|| format!("call({})", method))?;
            Ok(())
        })
    }

    /// Ask the Python object to propagate labels arriving on `input`.
    ///
    /// Returns the labels the override posted, paired with the index of
    /// their output port, or `None` when the object has no override and the
    /// default should run.
    fn propagate_override(
        &self,
        input: &InputPort,
        outputs: &[OutputPort],
    ) -> Result<Option<Vec<(usize, Label)>>> {
        let target = self.handle("propagate_labels")?;
        with_lock(|py| {
            let obj = target.bind(py)?;
            let has_hook = obj
                .hasattr(PROPAGATE_HOOK)
                .or_execution(|| "hasattr(_propagateLabels)".to_string())?;
            if !has_hook {
                return Ok(None);
            }
            let context = || format!("call({})", PROPAGATE_HOOK);
            let ports = Bound::new(py, Ports::new(target.env().clone(), input, outputs))
                .or_execution(context)?;
            let not_implemented = obj
                .call_method1(PROPAGATE_HOOK, (ports.clone(),))
                .and_then(|result| result.is_truthy());
            let posted = ports
                .try_borrow_mut()
                .map_err(PyErr::from)
                .map(|mut ports| ports.finish())
                .or_execution(context)?;
            if not_implemented.or_execution(context)? {
                return Ok(None);
            }
            Ok(Some(posted))
        })
    }
}

impl Block for ScriptBlock {
    fn work(&mut self) -> Result<()> {
        self.forward("work")
    }

    fn activate(&mut self) -> Result<()> {
        self.forward("activate")?;
        self.state = BlockState::Active;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.forward("deactivate")?;
        self.state = BlockState::Inactive;
        Ok(())
    }

    fn propagate_labels(&mut self, input: &InputPort, outputs: &mut [OutputPort]) -> Result<()> {
        match self.propagate_override(input, outputs)? {
            Some(posted) => {
                for (position, label) in posted {
                    outputs[position].post_label(label);
                }
            }
            None => {
                tracing::debug!(
                    block = %self.id,
                    port = input.name(),
                    "default label propagation"
                );
                propagate_labels_default(input, outputs);
            }
        }
        Ok(())
    }

    /// Every call except `BIND_CALL` goes to the Python object; arguments
    /// are converted on the way in and the result on the way out.
    fn opaque_call(&mut self, name: &str, args: &[Object]) -> Result<Object> {
        if name == BIND_CALL {
            let target = match args {
                [Object::Proxy(target)] => target.clone(),
                _ => {
                    let found = format!("{} arguments", args.len());
                    return Err(Error::mismatch("one python proxy", found));
                }
            };
            self.bind(target)?;
            return Ok(Object::Null);
        }

        let target = self.handle(name)?;
        let env = target.env().clone();
        let result = target.call_with_objects(name, args)?;
        env.to_native_lenient(&result)
    }
}
