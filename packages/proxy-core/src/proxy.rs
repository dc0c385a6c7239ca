//! Proxies, proxy environments and the environment factory registry.
//!
//! A `ProxyEnvironment` is one binding to a foreign runtime. It turns host
//! `Object`s into `Proxy` handles (values living in the runtime) and back.
//! Environments are created by name through factories registered under
//! `/proxy/environment/<name>`.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use uuid::Uuid;

use crate::convert::FromObject;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::plugin::{PluginPath, PluginRegistry};

/// Identity of one environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(Uuid);

impl EnvironmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EnvironmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One value owned by a foreign environment.
///
/// Implementations hold whatever reference the runtime needs and release it
/// when dropped.
pub trait ProxyHandle: Send + Sync {
    /// The environment this value lives in.
    fn environment(&self) -> Arc<dyn ProxyEnvironment>;

    /// Call method `name` on the value.
    fn call(&self, name: &str, args: &[Proxy]) -> Result<Proxy>;

    /// Call the value itself.
    fn invoke(&self, args: &[Proxy]) -> Result<Proxy>;

    /// Read attribute `name`.
    fn get(&self, name: &str) -> Result<Proxy>;

    /// Write attribute `name`.
    fn set(&self, name: &str, value: &Proxy) -> Result<()>;

    /// Compare using the runtime's own ordering.
    fn compare_to(&self, other: &Proxy) -> Result<Ordering>;

    /// Name of the value's class in the runtime.
    fn class_name(&self) -> String;

    /// The runtime's string rendering of the value.
    fn to_display(&self) -> String;

    /// A number identifying the underlying foreign value. Two handles to the
    /// same value share an identity.
    fn identity(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// A clonable, shared handle to a foreign value.
///
/// Dropping the last clone drops the handle and with it the foreign
/// reference.
#[derive(Clone)]
pub struct Proxy(Arc<dyn ProxyHandle>);

impl Proxy {
    pub fn new<H: ProxyHandle + 'static>(handle: H) -> Self {
        Self(Arc::new(handle))
    }

    pub fn handle(&self) -> &dyn ProxyHandle {
        self.0.as_ref()
    }

    /// Borrow the concrete handle type, if it is an `H`.
    pub fn downcast_handle<H: ProxyHandle + 'static>(&self) -> Option<&H> {
        self.0.as_any().downcast_ref::<H>()
    }

    pub fn environment(&self) -> Arc<dyn ProxyEnvironment> {
        self.0.environment()
    }

    pub fn call(&self, name: &str, args: &[Proxy]) -> Result<Proxy> {
        self.0.call(name, args)
    }

    /// Call method `name`, converting host arguments on the way in.
    pub fn call_with(&self, name: &str, args: &[Object]) -> Result<Proxy> {
        let env = self.environment();
        let args = args
            .iter()
            .map(|arg| env.convert_object_to_proxy(arg))
            .collect::<Result<Vec<_>>>()?;
        self.0.call(name, &args)
    }

    pub fn invoke(&self, args: &[Proxy]) -> Result<Proxy> {
        self.0.invoke(args)
    }

    pub fn get(&self, name: &str) -> Result<Proxy> {
        self.0.get(name)
    }

    pub fn set(&self, name: &str, value: &Proxy) -> Result<()> {
        self.0.set(name, value)
    }

    pub fn compare_to(&self, other: &Proxy) -> Result<Ordering> {
        self.0.compare_to(other)
    }

    pub fn class_name(&self) -> String {
        self.0.class_name()
    }

    pub fn to_display(&self) -> String {
        self.0.to_display()
    }

    pub fn identity(&self) -> usize {
        self.0.identity()
    }

    /// Convert to a host object through the owning environment.
    pub fn to_object(&self) -> Result<Object> {
        self.environment().convert_proxy_to_object(self)
    }

    /// Convert to a typed host value.
    pub fn convert<T: FromObject>(&self) -> Result<T> {
        self.to_object()?.convert()
    }

    /// Number of live clones of this proxy.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Proxy({}@{:#x})",
            self.environment().name(),
            self.identity()
        )
    }
}

/// One binding to a foreign runtime.
pub trait ProxyEnvironment: Send + Sync {
    /// The name this environment was registered under (e.g. `"python"`).
    fn name(&self) -> &str;

    fn id(&self) -> EnvironmentId;

    /// Look up a module or top-level symbol by dotted name.
    fn find_proxy(&self, name: &str) -> Result<Proxy>;

    fn convert_object_to_proxy(&self, object: &Object) -> Result<Proxy>;

    fn convert_proxy_to_object(&self, proxy: &Proxy) -> Result<Object>;

    /// Write the runtime's own marshaled form of `proxy` to `sink`.
    fn serialize(&self, proxy: &Proxy, sink: &mut dyn Write) -> Result<()>;

    /// Read a value written by `serialize`.
    fn deserialize(&self, source: &mut dyn Read) -> Result<Proxy>;
}

impl dyn ProxyEnvironment {
    /// Convert any host value into a proxy.
    pub fn make_proxy<T: Into<Object>>(&self, value: T) -> Result<Proxy> {
        self.convert_object_to_proxy(&value.into())
    }

    /// True when `proxy` belongs to this environment.
    pub fn owns(&self, proxy: &Proxy) -> bool {
        proxy.environment().id() == self.id()
    }
}

/// Construction arguments for an environment factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentArgs {
    pub extra: BTreeMap<String, String>,
}

impl EnvironmentArgs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// Creates an environment from construction arguments.
pub type EnvironmentFactory =
    Arc<dyn Fn(&EnvironmentArgs) -> Result<Arc<dyn ProxyEnvironment>> + Send + Sync>;

fn environment_path(name: &str) -> Result<PluginPath> {
    Ok(PluginPath::parse("/proxy/environment")?.join(name)?)
}

/// Register an environment factory under `/proxy/environment/<name>`.
pub fn register_environment(name: &str, factory: EnvironmentFactory) -> Result<()> {
    PluginRegistry::add(environment_path(name)?, factory);
    Ok(())
}

/// Create an environment through the factory registered as `name`.
///
/// # Errors
///
/// `EnvironmentNotFound` when no factory is registered under the name.
pub fn make_environment(name: &str, args: &EnvironmentArgs) -> Result<Arc<dyn ProxyEnvironment>> {
    let path = environment_path(name).map_err(|_| Error::EnvironmentNotFound(name.to_string()))?;
    let factory = PluginRegistry::get::<EnvironmentFactory>(&path)
        .map_err(|_| Error::EnvironmentNotFound(name.to_string()))?;
    factory(args)
}


#[cfg(test)]
mod tests {
    use super::testing::HostEnvironment;
    use super::*;

    #[test]
    fn proxies_round_trip_through_environment() {
        let env: Arc<dyn ProxyEnvironment> = HostEnvironment::new();
        let proxy = env.make_proxy(42i64).unwrap();
        assert_eq!(proxy.convert::<i64>().unwrap(), 42);
        assert!(env.owns(&proxy));
        assert_eq!(proxy.environment().name(), "host");
    }

    #[test]
    fn call_with_converts_arguments() {
        let env: Arc<dyn ProxyEnvironment> = HostEnvironment::new();
        let list = env.make_proxy(vec![1i32, 2, 3]).unwrap();
        let len = list.call_with("len", &[]).unwrap();
        assert_eq!(len.convert::<u64>().unwrap(), 3);

        let echoed = list.call_with("echo", &[Object::from("hi")]).unwrap();
        assert_eq!(echoed.convert::<String>().unwrap(), "hi");

        assert!(matches!(
            list.call("missing", &[]),
            Err(Error::CallNotFound(_))
        ));
    }

    #[test]
    fn proxies_compare_through_handle() {
        let env: Arc<dyn ProxyEnvironment> = HostEnvironment::new();
        let a = env.make_proxy(1i64).unwrap();
        let b = env.make_proxy(2i64).unwrap();
        assert_eq!(a.compare_to(&b).unwrap(), Ordering::Less);
    }

    #[test]
    fn environment_factories_by_name() {
        let factory: EnvironmentFactory =
            Arc::new(|_args: &EnvironmentArgs| -> Result<Arc<dyn ProxyEnvironment>> {
                let env: Arc<dyn ProxyEnvironment> = HostEnvironment::new();
                Ok(env)
            });
        register_environment("host_for_tests", factory).unwrap();

        let env = make_environment("host_for_tests", &EnvironmentArgs::new()).unwrap();
        assert_eq!(env.name(), "host");

        let a = make_environment("host_for_tests", &EnvironmentArgs::new()).unwrap();
        assert_ne!(a.id(), env.id());

        assert!(matches!(
            make_environment("no_such_environment", &EnvironmentArgs::new()),
            Err(Error::EnvironmentNotFound(_))
        ));
    }

    #[test]
    fn environment_args_builder() {
        let args = EnvironmentArgs::new().with("support_module", "none");
        assert_eq!(args.get("support_module"), Some("none"));
        assert_eq!(args.get("missing"), None);
    }

    #[test]
    fn serialize_passes_bytes_through() {
        let env: Arc<dyn ProxyEnvironment> = HostEnvironment::new();
        let proxy = env.make_proxy("payload").unwrap();
        let mut bytes = Vec::new();
        env.serialize(&proxy, &mut bytes).unwrap();
        let back = env.deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(back.convert::<String>().unwrap(), "payload");
    }
}
