//! Processing blocks, ports and labels.
//!
//! A Block is the host framework's unit of processing. The framework drives
//! it through lifecycle calls (`activate`, `work`, `deactivate`), forwards
//! stream labels between ports, and routes any other named call through
//! `opaque_call`.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::object::Object;
use crate::plugin::{PluginPath, PluginRegistry};

/// Unique identifier for a Block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Create a new random BlockId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Created, nothing attached yet.
    Unbound,
    /// Attached to its implementation but never activated.
    Bound,
    /// Between `activate` and `deactivate`.
    Active,
    /// Deactivated. Re-activation is legal.
    Inactive,
}

/// A label attached to a position in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub data: Object,
    /// Element index in the stream.
    pub index: u64,
    /// Number of elements the label covers.
    pub width: u64,
}

impl Label {
    pub fn new(id: impl Into<String>, data: impl Into<Object>, index: u64) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            index,
            width: 1,
        }
    }
}

/// An input port and the labels that arrived on it during this work call.
#[derive(Debug, Clone, Default)]
pub struct InputPort {
    name: String,
    labels: Vec<Label>,
}

impl InputPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }
}

/// An output port collecting posted labels.
#[derive(Debug, Clone, Default)]
pub struct OutputPort {
    name: String,
    posted: Vec<Label>,
}

impl OutputPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            posted: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post_label(&mut self, label: Label) {
        self.posted.push(label);
    }

    /// Labels posted so far.
    pub fn posted(&self) -> &[Label] {
        &self.posted
    }
}

/// Forward every label of `input` to every output, once each.
pub fn propagate_labels_default(input: &InputPort, outputs: &mut [OutputPort]) {
    for output in outputs.iter_mut() {
        for label in input.labels() {
            output.post_label(label.clone());
        }
    }
}

/// The polymorphic processing-block contract.
pub trait Block: Send {
    /// Process available input.
    fn work(&mut self) -> Result<()>;

    fn activate(&mut self) -> Result<()>;

    fn deactivate(&mut self) -> Result<()>;

    /// Forward labels that arrived on `input`.
    fn propagate_labels(&mut self, input: &InputPort, outputs: &mut [OutputPort]) -> Result<()> {
        propagate_labels_default(input, outputs);
        Ok(())
    }

    /// Dispatch an arbitrary named call.
    fn opaque_call(&mut self, name: &str, _args: &[Object]) -> Result<Object> {
        Err(Error::CallNotFound(name.to_string()))
    }
}

/// Builds a block from construction arguments.
pub type BlockFactory = Arc<dyn Fn(&[Object]) -> Result<Box<dyn Block>> + Send + Sync>;

/// Block factories registered under `/blocks/...`.
pub struct BlockRegistry;

impl BlockRegistry {
    fn full_path(path: &str) -> Result<PluginPath> {
        let path = PluginPath::parse(path)?;
        if path.iter().next().map(String::as_str) == Some("blocks") {
            Ok(path)
        } else {
            Ok(PluginPath::parse("/blocks")?.join(&path.to_string())?)
        }
    }

    /// Register `factory` at `path`; `/blocks` is prepended when missing.
    pub fn register(path: &str, factory: BlockFactory) -> Result<PluginPath> {
        let path = Self::full_path(path)?;
        PluginRegistry::add(path.clone(), factory);
        Ok(path)
    }

    /// Construct the block registered at `path`.
    pub fn make(path: &str, args: &[Object]) -> Result<Box<dyn Block>> {
        let path = Self::full_path(path)?;
        let factory = PluginRegistry::get::<BlockFactory>(&path)?;
        factory(args)
    }

    /// Registered block paths.
    pub fn list() -> Vec<PluginPath> {
        match PluginPath::parse("/blocks") {
            Ok(prefix) => PluginRegistry::list(&prefix),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: i64,
        state: BlockState,
    }

    impl Block for Counter {
        fn work(&mut self) -> Result<()> {
            self.count += 1;
            Ok(())
        }

        fn activate(&mut self) -> Result<()> {
            self.state = BlockState::Active;
            Ok(())
        }

        fn deactivate(&mut self) -> Result<()> {
            self.state = BlockState::Inactive;
            Ok(())
        }

        fn opaque_call(&mut self, name: &str, args: &[Object]) -> Result<Object> {
            match name {
                "count" => Ok(Object::from(self.count)),
                "add" => {
                    let n: i64 = args
                        .first()
                        .ok_or_else(|| Error::mismatch("i64", "nothing"))?
                        .convert()?;
                    self.count += n;
                    Ok(Object::Null)
                }
                other => Err(Error::CallNotFound(other.to_string())),
            }
        }
    }

    #[test]
    fn default_label_propagation_forwards_once() {
        let mut input = InputPort::new("0");
        input.push_label(Label::new("rxTime", 5u64, 10));
        input.push_label(Label::new("freq", 1.5f64, 12));
        let mut outputs = vec![OutputPort::new("0"), OutputPort::new("1")];

        propagate_labels_default(&input, &mut outputs);

        for output in &outputs {
            assert_eq!(output.posted(), input.labels());
        }
    }

    #[test]
    fn default_opaque_call_is_not_found() {
        struct Empty;
        impl Block for Empty {
            fn work(&mut self) -> Result<()> {
                Ok(())
            }
            fn activate(&mut self) -> Result<()> {
                Ok(())
            }
            fn deactivate(&mut self) -> Result<()> {
                Ok(())
            }
        }
        let mut block = Empty;
        assert!(matches!(
            block.opaque_call("anything", &[]),
            Err(Error::CallNotFound(name)) if name == "anything"
        ));
    }

    #[test]
    fn registry_makes_blocks() {
        let factory: BlockFactory = Arc::new(|args: &[Object]| -> Result<Box<dyn Block>> {
            let start: i64 = match args.first() {
                Some(arg) => arg.convert()?,
                None => 0,
            };
            Ok(Box::new(Counter {
                count: start,
                state: BlockState::Bound,
            }) as Box<dyn Block>)
        });
        let path = BlockRegistry::register("tests/counter", factory).unwrap();
        assert_eq!(path.to_string(), "/blocks/tests/counter");
        assert!(BlockRegistry::list().contains(&path));

        let mut block =
            BlockRegistry::make("/blocks/tests/counter", &[Object::from(10i32)]).unwrap();
        block.activate().unwrap();
        block.work().unwrap();
        block.opaque_call("add", &[Object::from(5u8)]).unwrap();
        assert_eq!(
            block.opaque_call("count", &[]).unwrap(),
            Object::from(16i64)
        );
        block.deactivate().unwrap();

        assert!(matches!(
            BlockRegistry::make("tests/not_registered", &[]),
            Err(Error::PluginNotFound(_))
        ));
    }
}
