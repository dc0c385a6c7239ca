//! Hierarchical plugin paths and the process-wide plugin registry.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::error::{Error, Result};

/// Errors related to plugin path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginPathError {
    /// A path component is not a valid Unicode identifier.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
}

impl fmt::Display for PluginPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginPathError::InvalidComponent {
                component,
                position,
                message,
            } => write!(
                f,
                "invalid plugin path component '{}' at position {}: {}",
                component, position, message
            ),
        }
    }
}

impl std::error::Error for PluginPathError {}

/// A validated plugin path such as `/proxy/converters/python/bool_to_pybool`.
///
/// Components must be Unicode identifiers (UAX#31) or numeric strings.
/// Leading, trailing and repeated slashes are normalized away, and the path
/// always displays with a leading `/`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PluginPath {
    components: Vec<String>,
}

impl PluginPath {
    /// Parse a path string, validating components.
    ///
    /// ```rust
    /// use proxy_core::PluginPath;
    ///
    /// let path = PluginPath::parse("/blocks/python_block").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(path.to_string(), "/blocks/python_block");
    /// ```
    pub fn parse(s: &str) -> std::result::Result<Self, PluginPathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(PluginPath { components })
    }

    fn validate_component(
        component: &str,
        position: usize,
    ) -> std::result::Result<(), PluginPathError> {
        let invalid = |message: String| PluginPathError::InvalidComponent {
            component: component.to_string(),
            position,
            message,
        };

        let mut chars = component.chars();
        let Some(first) = chars.next() else {
            return Err(invalid("empty component".to_string()));
        };

        if component.chars().all(|c| c.is_ascii_digit()) {
            return Ok(());
        }

        let valid_start = unicode_ident::is_xid_start(first)
            || (first == '_'
                && chars
                    .clone()
                    .next()
                    .is_some_and(unicode_ident::is_xid_continue));
        if !valid_start {
            return Err(invalid(
                "must start with a letter or underscore followed by letter/digit".to_string(),
            ));
        }

        for c in chars {
            if !unicode_ident::is_xid_continue(c) {
                return Err(invalid(format!("invalid character '{}' in identifier", c)));
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// Append one or more components (the argument is itself parsed).
    pub fn join(&self, suffix: &str) -> std::result::Result<PluginPath, PluginPathError> {
        let suffix = PluginPath::parse(suffix)?;
        let mut components = self.components.clone();
        components.extend(suffix.components);
        Ok(PluginPath { components })
    }

    pub fn has_prefix(&self, prefix: &PluginPath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// The final component, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }
}

impl fmt::Display for PluginPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}

impl std::str::FromStr for PluginPath {
    type Err = PluginPathError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PluginPath::parse(s)
    }
}

/// Macro for plugin path literals.
///
/// ```rust
/// use proxy_core::plugin_path;
///
/// let p = plugin_path!("/proxy/environment/python");
/// assert_eq!(p.leaf(), Some("python"));
/// ```
#[macro_export]
macro_rules! plugin_path {
    ($s:expr) => {
        $crate::PluginPath::parse($s).expect("invalid plugin path literal")
    };
}

type PluginValue = Arc<dyn Any + Send + Sync>;

lazy_static! {
    static ref PLUGINS: RwLock<BTreeMap<PluginPath, PluginValue>> = RwLock::new(BTreeMap::new());
}

/// The process-wide plugin table.
///
/// Values are type-erased; `get` downcasts to the type the caller expects.
/// Registration normally happens once at startup, but the table is guarded
/// so late registration is also safe.
pub struct PluginRegistry;

impl PluginRegistry {
    /// Register a plugin, replacing any earlier entry at the same path.
    pub fn add<T: Any + Send + Sync>(path: PluginPath, value: T) {
        let mut plugins = PLUGINS.write().unwrap_or_else(PoisonError::into_inner);
        if plugins.insert(path.clone(), Arc::new(value)).is_some() {
            tracing::warn!(%path, "plugin registration replaced an existing entry");
        } else {
            tracing::debug!(%path, "plugin registered");
        }
    }

    /// Fetch the plugin at `path` as a `T`.
    ///
    /// # Errors
    ///
    /// `PluginNotFound` when nothing is registered there or the entry has a
    /// different type.
    pub fn get<T: Any + Send + Sync>(path: &PluginPath) -> Result<Arc<T>> {
        let plugins = PLUGINS.read().unwrap_or_else(PoisonError::into_inner);
        plugins
            .get(path)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| Error::PluginNotFound(path.clone()))
    }

    pub fn contains(path: &PluginPath) -> bool {
        PLUGINS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Remove the plugin at `path`, returning whether one was present.
    pub fn remove(path: &PluginPath) -> bool {
        PLUGINS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    /// All registered paths under `prefix`, in order.
    pub fn list(prefix: &PluginPath) -> Vec<PluginPath> {
        PLUGINS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|path| path.has_prefix(prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let p = PluginPath::parse("proxy/converters/python/bool_to_pybool").unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.to_string(), "/proxy/converters/python/bool_to_pybool");
        assert_eq!(PluginPath::parse("/a//b/").unwrap(), PluginPath::parse("a/b").unwrap());
        assert!(PluginPath::parse("").unwrap().is_empty());
        assert_eq!(PluginPath::parse("").unwrap().to_string(), "/");
    }

    #[test]
    fn invalid_components_rejected() {
        assert!(PluginPath::parse("blocks/my-block").is_err());
        assert!(PluginPath::parse("blocks/.hidden").is_err());
        assert!(PluginPath::parse("blocks/1abc").is_err());
        assert!(PluginPath::parse("blocks/0").is_ok());
    }

    #[test]
    fn join_and_prefix() {
        let base = plugin_path!("/blocks");
        let child = base.join("python/adder").unwrap();
        assert_eq!(child.to_string(), "/blocks/python/adder");
        assert!(child.has_prefix(&base));
        assert!(!base.has_prefix(&child));
        assert_eq!(child.leaf(), Some("adder"));
    }

    #[test]
    fn registry_add_get_replace_remove() {
        let path = plugin_path!("/tests/plugin/registry_add_get");
        PluginRegistry::add(path.clone(), 1u32);
        assert_eq!(*PluginRegistry::get::<u32>(&path).unwrap(), 1);

        PluginRegistry::add(path.clone(), 2u32);
        assert_eq!(*PluginRegistry::get::<u32>(&path).unwrap(), 2);

        assert!(matches!(
            PluginRegistry::get::<String>(&path),
            Err(Error::PluginNotFound(_))
        ));

        assert!(PluginRegistry::remove(&path));
        assert!(!PluginRegistry::contains(&path));
    }

    #[test]
    fn registry_list_by_prefix() {
        PluginRegistry::add(plugin_path!("/tests/plugin/list/a"), ());
        PluginRegistry::add(plugin_path!("/tests/plugin/list/b"), ());
        PluginRegistry::add(plugin_path!("/tests/plugin/other"), ());

        let listed = PluginRegistry::list(&plugin_path!("/tests/plugin/list"));
        assert_eq!(
            listed,
            vec![
                plugin_path!("/tests/plugin/list/a"),
                plugin_path!("/tests/plugin/list/b"),
            ]
        );
    }
}
