use std::any::{Any, type_name};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{BoxError, Capability, ComponentInfo, ContainerError, DescriptorId};

/// A constructed component, stored as its concrete implementation type.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// A constructed component viewed through one capability: holds an `Arc<C>`.
pub(crate) type Resolved = Box<dyn Any + Send + Sync>;

type ConstructFn = dyn Fn(&Arguments<'_>) -> Result<Instance, BoxError> + Send + Sync;
type CastFn = dyn Fn(Instance) -> Option<Resolved> + Send + Sync;
type InjectFn = dyn Fn(&Instance, Resolved) -> Result<(), ContainerError> + Send + Sync;

/// Lifecycle policy for instances of a component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance, created on first request and cached.
    #[default]
    Singleton,
    /// A new instance on every request, never cached.
    Prototype,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Prototype => f.write_str("prototype"),
        }
    }
}

/// Descriptive role of a component. It never affects resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stereotype {
    #[default]
    Component,
    Service,
    Repository,
    Controller,
}

impl fmt::Display for Stereotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stereotype::Component => f.write_str("component"),
            Stereotype::Service => f.write_str("service"),
            Stereotype::Repository => f.write_str("repository"),
            Stereotype::Controller => f.write_str("controller"),
        }
    }
}

/// A named dependency on a capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    name: String,
    capability: Capability,
    optional: bool,
}

impl Dependency {
    /// Returns the parameter (or field) name of this dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Returns `true` if the component tolerates a missing binding for this dependency.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

pub(crate) struct Provides {
    capability: Capability,
    cast: Box<CastFn>,
}

impl Provides {
    fn new<T, C, F>(cast: F) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        Self {
            capability: Capability::of::<C>(),
            cast: Box::new(move |instance: Instance| {
                instance
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Box::new(cast(typed)) as Resolved)
            }),
        }
    }

    pub(crate) fn cast(&self, instance: Instance) -> Option<Resolved> {
        (self.cast)(instance)
    }
}

pub(crate) struct FieldInjection {
    dependency: Dependency,
    inject: Box<InjectFn>,
}

impl FieldInjection {
    pub(crate) fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub(crate) fn inject(
        &self,
        instance: &Instance,
        value: Resolved,
    ) -> Result<(), ContainerError> {
        (self.inject)(instance, value)
    }
}

/// Immutable registration record of one component.
///
/// A descriptor names the capabilities the component advertises, its constructor
/// dependencies in declaration order, its field dependencies, its [`Scope`] and
/// whether it is the primary choice for its capabilities. Descriptors are created
/// with [`ComponentDescriptor::builder`] (or derived with `#[derive(Component)]`)
/// and never change after registration.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use trellis::{ComponentDescriptor, Scope};
///
/// trait Repo: Send + Sync {}
///
/// struct MemoryRepo;
/// impl Repo for MemoryRepo {}
///
/// struct Service {
///     repo: Arc<dyn Repo>,
/// }
///
/// let repo = ComponentDescriptor::builder::<MemoryRepo>()
///     .provides(|r| r as Arc<dyn Repo>)
///     .construct(|_| Ok(MemoryRepo))
///     .build()
///     .unwrap();
///
/// let service = ComponentDescriptor::builder::<Service>()
///     .depends_on::<dyn Repo>("repo")
///     .scope(Scope::Prototype)
///     .construct(|args| Ok(Service { repo: args.required("repo")? }))
///     .build()
///     .unwrap();
///
/// assert_eq!(service.dependencies()[0].name(), "repo");
/// assert!(repo.capabilities().any(|c| c == trellis::Capability::of::<dyn Repo>()));
/// ```
pub struct ComponentDescriptor {
    info: ComponentInfo,
    implementation: Capability,
    provides: Vec<Provides>,
    dependencies: Vec<Dependency>,
    fields: Vec<FieldInjection>,
    scope: Scope,
    primary: bool,
    stereotype: Stereotype,
    construct: Box<ConstructFn>,
}

impl ComponentDescriptor {
    /// Starts describing a component implemented by `T`.
    pub fn builder<T>() -> ComponentDescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        ComponentDescriptorBuilder {
            provides: Vec::new(),
            dependencies: Vec::new(),
            fields: Vec::new(),
            scope: Scope::default(),
            primary: false,
            stereotype: Stereotype::default(),
            construct: None,
            marker: PhantomData,
        }
    }

    /// Starts describing a component whose instance already exists.
    ///
    /// Every request is served with the given value.
    pub fn instance<T>(value: Arc<T>) -> ComponentDescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        let mut builder = Self::builder::<T>();
        builder.construct = Some(Box::new(move |_: &Arguments<'_>| {
            Ok(Arc::clone(&value) as Instance)
        }));
        builder
    }

    pub fn id(&self) -> DescriptorId {
        self.info.id()
    }

    pub fn info(&self) -> ComponentInfo {
        self.info
    }

    /// Returns the type name of the implementation.
    pub fn name(&self) -> &'static str {
        self.info.name()
    }

    pub fn implementation(&self) -> Capability {
        self.implementation
    }

    /// Returns the capabilities this component advertises.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.provides.iter().map(|p| p.capability)
    }

    /// Returns the constructor dependencies in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Returns the dependencies injected after construction.
    pub fn field_dependencies(&self) -> impl Iterator<Item = &Dependency> + '_ {
        self.fields.iter().map(|f| &f.dependency)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn stereotype(&self) -> Stereotype {
        self.stereotype
    }

    pub(crate) fn provides(&self, index: usize) -> &Provides {
        &self.provides[index]
    }

    pub(crate) fn fields(&self) -> &[FieldInjection] {
        &self.fields
    }

    pub(crate) fn construct(&self, arguments: &Arguments<'_>) -> Result<Instance, BoxError> {
        (self.construct)(arguments)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("info", &self.info)
            .field("capabilities", &self.capabilities().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies)
            .field("fields", &self.field_dependencies().collect::<Vec<_>>())
            .field("scope", &self.scope)
            .field("primary", &self.primary)
            .field("stereotype", &self.stereotype)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ComponentDescriptor`].
pub struct ComponentDescriptorBuilder<T> {
    provides: Vec<Provides>,
    dependencies: Vec<Dependency>,
    fields: Vec<FieldInjection>,
    scope: Scope,
    primary: bool,
    stereotype: Stereotype,
    construct: Option<Box<ConstructFn>>,
    marker: PhantomData<fn() -> T>,
}

impl<T> ComponentDescriptorBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Advertises the capability `C`, usually an interface implemented by `T`.
    ///
    /// The function converts the implementation pointer into the capability
    /// pointer, typically `|c| c as Arc<dyn Interface>`. Without any `provides`
    /// call the component advertises `T` itself.
    pub fn provides<C, F>(mut self, cast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        self.provides.push(Provides::new::<T, C, F>(cast));
        self
    }

    /// Declares a required constructor dependency on `C`.
    pub fn depends_on<C>(mut self, name: impl Into<String>) -> Self
    where
        C: ?Sized + 'static,
    {
        self.dependencies.push(dependency::<C>(name, false));
        self
    }

    /// Declares an optional constructor dependency on `C`.
    ///
    /// When no unique component provides `C` the constructor sees `None`.
    pub fn optional<C>(mut self, name: impl Into<String>) -> Self
    where
        C: ?Sized + 'static,
    {
        self.dependencies.push(dependency::<C>(name, true));
        self
    }

    /// Declares a dependency on `C` that is assigned after construction.
    ///
    /// Field dependencies may point back at components that depend on this one
    /// through their constructors; the value is assigned once the outermost
    /// resolution has finished constructing.
    pub fn field<C, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<C>) + Send + Sync + 'static,
    {
        self.push_field::<C, F>(dependency::<C>(name, false), setter)
    }

    /// Declares an optional field dependency on `C`.
    pub fn optional_field<C, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<C>) + Send + Sync + 'static,
    {
        self.push_field::<C, F>(dependency::<C>(name, true), setter)
    }

    fn push_field<C, F>(mut self, dependency: Dependency, setter: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<C>) + Send + Sync + 'static,
    {
        let inject = move |instance: &Instance, value: Resolved| {
            let target = (**instance)
                .downcast_ref::<T>()
                .ok_or(ContainerError::TypeMismatch {
                    component: type_name::<T>(),
                    expected: type_name::<T>(),
                })?;
            let value = value
                .downcast::<Arc<C>>()
                .map_err(|_| ContainerError::TypeMismatch {
                    component: type_name::<T>(),
                    expected: type_name::<C>(),
                })?;
            setter(target, *value);
            Ok(())
        };
        self.fields.push(FieldInjection {
            dependency,
            inject: Box::new(inject),
        });
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Marks the component as the default choice for its capabilities.
    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn stereotype(mut self, stereotype: Stereotype) -> Self {
        self.stereotype = stereotype;
        self
    }

    /// Sets the constructor.
    ///
    /// The constructor receives the resolved constructor dependencies through
    /// [`Arguments`] and may fail with any error.
    pub fn construct<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arguments<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.construct = Some(Box::new(move |arguments: &Arguments<'_>| {
            Ok(Arc::new(factory(arguments)?) as Instance)
        }));
        self
    }

    /// Validates the declaration and produces the descriptor.
    pub fn build(self) -> Result<ComponentDescriptor, ContainerError> {
        let component = type_name::<T>();
        let invalid = |reason: String| ContainerError::InvalidComponent { component, reason };
        let construct = self
            .construct
            .ok_or_else(|| invalid("no constructor was supplied".into()))?;
        let mut names = HashSet::new();
        for dependency in self
            .dependencies
            .iter()
            .chain(self.fields.iter().map(|f| &f.dependency))
        {
            if dependency.name.trim().is_empty() {
                return Err(invalid(format!(
                    "dependency on {} has no name",
                    dependency.capability
                )));
            }
            if !names.insert(dependency.name.as_str()) {
                return Err(invalid(format!(
                    "dependency {} is declared more than once",
                    dependency.name
                )));
            }
        }
        let mut provides = self.provides;
        if provides.is_empty() {
            provides.push(Provides::new::<T, T, _>(|c: Arc<T>| c));
        }
        let mut capabilities = HashSet::new();
        for p in &provides {
            if !capabilities.insert(p.capability) {
                return Err(invalid(format!(
                    "capability {} is advertised more than once",
                    p.capability
                )));
            }
        }
        Ok(ComponentDescriptor {
            info: ComponentInfo::new(DescriptorId::next(), component),
            implementation: Capability::of::<T>(),
            provides,
            dependencies: self.dependencies,
            fields: self.fields,
            scope: self.scope,
            primary: self.primary,
            stereotype: self.stereotype,
            construct,
        })
    }
}

fn dependency<C>(name: impl Into<String>, optional: bool) -> Dependency
where
    C: ?Sized + 'static,
{
    Dependency {
        name: name.into(),
        capability: Capability::of::<C>(),
        optional,
    }
}

/// Resolved constructor dependencies, looked up by parameter name.
pub struct Arguments<'a> {
    component: ComponentInfo,
    values: Vec<(&'a Dependency, Option<Resolved>)>,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(
        component: ComponentInfo,
        values: Vec<(&'a Dependency, Option<Resolved>)>,
    ) -> Self {
        Self { component, values }
    }

    /// Returns the component being constructed.
    pub fn component(&self) -> ComponentInfo {
        self.component
    }

    /// Returns the value of a required dependency.
    pub fn required<C>(&self, name: &str) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let (dependency, value) = self.entry(name)?;
        match value {
            Some(value) => self.downcast(value),
            None => Err(ContainerError::UnresolvedDependency {
                capability: dependency.capability,
                required_by: Some(self.component),
            }),
        }
    }

    /// Returns the value of an optional dependency, `None` if it has no binding.
    pub fn optional<C>(&self, name: &str) -> Result<Option<Arc<C>>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let (_, value) = self.entry(name)?;
        value.as_ref().map(|v| self.downcast(v)).transpose()
    }

    fn entry(&self, name: &str) -> Result<&(&'a Dependency, Option<Resolved>), ContainerError> {
        self.values
            .iter()
            .find(|(dependency, _)| dependency.name == name)
            .ok_or_else(|| ContainerError::UndeclaredDependency {
                component: self.component.name(),
                parameter: name.to_owned(),
            })
    }

    fn downcast<C>(&self, value: &Resolved) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        value
            .downcast_ref::<Arc<C>>()
            .cloned()
            .ok_or(ContainerError::TypeMismatch {
                component: self.component.name(),
                expected: type_name::<C>(),
            })
    }
}

/// Types that describe their own registration.
///
/// Usually implemented with `#[derive(Component)]` or `#[injectable]`.
pub trait Component: Send + Sync + Sized + 'static {
    fn descriptor() -> Result<ComponentDescriptor, ContainerError>;
}
