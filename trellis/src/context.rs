use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use duration_str::deserialize_duration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize, Serializer};

use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::scope::ScopeManager;
use crate::{
    Capability, Component, ComponentDescriptor, ComponentInfo, ComponentStats, ContainerError,
    ContextStats,
};

/// Settings of an [`ApplicationContext`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Constructions slower than this are reported with a warning.
    #[serde(
        default = "default_slow_construction_threshold",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub slow_construction_threshold: Duration,
    /// Collect per-component construction metrics.
    #[serde(default = "default_metrics")]
    pub metrics: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            slow_construction_threshold: default_slow_construction_threshold(),
            metrics: default_metrics(),
        }
    }
}

const DEFAULT_SLOW_CONSTRUCTION_THRESHOLD: Duration = Duration::from_millis(100);

fn default_slow_construction_threshold() -> Duration {
    DEFAULT_SLOW_CONSTRUCTION_THRESHOLD
}

fn default_metrics() -> bool {
    true
}

fn serialize_duration<S>(v: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}ms", v.as_millis()))
}

/// Process-wide container of components.
///
/// The context owns the registry of component descriptors and the cache of
/// singleton instances. Components are registered first and resolved lazily on
/// the first [`get`](Self::get) that needs them. The context is `Send + Sync`
/// and is meant to be shared by reference or through an [`Arc`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use trellis::{ApplicationContext, ComponentDescriptor};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "Hello".to_string()
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let context = ApplicationContext::new();
/// context.register(
///     ComponentDescriptor::builder::<English>()
///         .provides(|c| c as Arc<dyn Greeter>)
///         .construct(|_| Ok(English))
///         .build()?,
/// )?;
///
/// let greeter = context.get::<dyn Greeter>()?;
/// assert_eq!(greeter.greet(), "Hello");
/// assert!(Arc::ptr_eq(&greeter, &context.get::<dyn Greeter>()?));
/// # Ok(())
/// # }
/// ```
pub struct ApplicationContext {
    registry: RwLock<Registry>,
    scopes: ScopeManager,
    metrics: Metrics,
    config: ContextConfig,
    sealed: AtomicBool,
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            scopes: ScopeManager::new(),
            metrics: Metrics::default(),
            config,
            sealed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Registers a component descriptor.
    ///
    /// Registration after the first resolution is allowed, but singletons that
    /// are already cached keep the dependencies they were built with.
    pub fn register(
        &self,
        descriptor: ComponentDescriptor,
    ) -> Result<ComponentInfo, ContainerError> {
        let mut registry = self.registry.write();
        if self.sealed.load(Ordering::Acquire) {
            tracing::warn!(
                component = descriptor.name(),
                "Component registered after first resolution"
            );
        }
        let descriptor = registry.register(descriptor)?;
        tracing::debug!(
            component = descriptor.name(),
            scope = %descriptor.scope(),
            primary = descriptor.is_primary(),
            stereotype = %descriptor.stereotype(),
            "Component registered"
        );
        Ok(descriptor.info())
    }

    /// Registers a type that describes itself.
    pub fn register_component<T>(&self) -> Result<ComponentInfo, ContainerError>
    where
        T: Component,
    {
        self.register(T::descriptor()?)
    }

    /// Returns an instance of the capability `C`.
    ///
    /// Singletons are created on first request and shared afterwards; prototypes
    /// are created on every request.
    pub fn get<C>(&self) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.sealed.store(true, Ordering::Release);
        let capability = Capability::of::<C>();
        // Constructors may resolve from this context again.
        let registry = self.registry.read_recursive();
        let resolved = self.resolver(&registry).get(capability)?;
        resolved
            .downcast::<Arc<C>>()
            .map(|v| *v)
            .map_err(|_| ContainerError::TypeMismatch {
                component: capability.name(),
                expected: std::any::type_name::<C>(),
            })
    }

    /// Returns `true` if at least one component provides `C`.
    pub fn contains<C>(&self) -> bool
    where
        C: ?Sized + 'static,
    {
        self.registry.read().contains(Capability::of::<C>())
    }

    /// Returns the descriptor that serves requests for `C`.
    pub fn lookup<C>(&self) -> Result<Arc<ComponentDescriptor>, ContainerError>
    where
        C: ?Sized + 'static,
    {
        self.registry.read().lookup(Capability::of::<C>()).cloned()
    }

    /// Drops the cached singleton that serves `C`, so the next request creates it again.
    ///
    /// Returns `false` if nothing was cached.
    pub fn evict<C>(&self) -> Result<bool, ContainerError>
    where
        C: ?Sized + 'static,
    {
        let descriptor = self.lookup::<C>()?;
        let evicted = self.scopes.evict(descriptor.id());
        if evicted {
            tracing::debug!(component = descriptor.name(), "Singleton evicted");
        }
        Ok(evicted)
    }

    /// Forgets every registration, cached singleton and metric.
    pub fn reset(&self) {
        let mut registry = self.registry.write();
        registry.clear();
        self.scopes.clear();
        self.metrics.clear();
        self.sealed.store(false, Ordering::Release);
        tracing::debug!("Application context reset");
    }

    /// Checks every registered component without constructing anything.
    pub fn validate(&self) -> Result<(), Vec<ContainerError>> {
        let registry = self.registry.read_recursive();
        self.resolver(&registry).validate()
    }

    /// Returns the registered descriptors in registration order.
    pub fn components(&self) -> Vec<Arc<ComponentDescriptor>> {
        self.registry.read().components().to_vec()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            registered_components: self.registry.read().len(),
            active_singletons: self.scopes.len(),
            constructions: self.metrics.constructions(),
            resolution_errors: self.metrics.errors(),
        }
    }

    /// Returns construction metrics of every constructed component, slowest first.
    pub fn component_stats(&self) -> Vec<ComponentStats> {
        self.metrics.components()
    }

    /// Returns construction metrics of the component serving `C`.
    pub fn component_stats_of<C>(&self) -> Result<Option<ComponentStats>, ContainerError>
    where
        C: ?Sized + 'static,
    {
        Ok(self.metrics.component(self.lookup::<C>()?.id()))
    }

    fn resolver<'a>(&'a self, registry: &'a Registry) -> Resolver<'a> {
        Resolver {
            registry,
            scopes: &self.scopes,
            metrics: &self.metrics,
            config: &self.config,
        }
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
