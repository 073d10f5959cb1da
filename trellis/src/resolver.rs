use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::context::ContextConfig;
use crate::descriptor::{Instance, Resolved};
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::scope::ScopeManager;
use crate::{
    Arguments, Capability, ComponentDescriptor, ComponentInfo, ContainerError, DescriptorId, Scope,
};

thread_local! {
    /// Components under construction on this thread, across nested requests.
    static CONSTRUCTING: RefCell<Vec<ComponentInfo>> = const { RefCell::new(Vec::new()) };
}

/// Fails if `component` is already being constructed on this thread.
///
/// A constructor that requests the singleton whose construction led to it,
/// through another `get`, would otherwise wait on its own cell forever.
fn check_reentry(component: ComponentInfo) -> Result<(), ContainerError> {
    CONSTRUCTING.with_borrow(|stack| {
        match stack.iter().position(|c| c.id() == component.id()) {
            Some(index) => Err(ContainerError::CircularDependency {
                cycle: stack[index..].to_vec(),
            }),
            None => Ok(()),
        }
    })
}

/// Keeps a component on the construction stack of this thread until dropped.
struct Constructing;

impl Constructing {
    fn enter(component: ComponentInfo) -> Self {
        CONSTRUCTING.with_borrow_mut(|stack| stack.push(component));
        Self
    }
}

impl Drop for Constructing {
    fn drop(&mut self) {
        CONSTRUCTING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

/// Components currently being resolved along one dependency path.
///
/// Entering a component that is already on the path reports the cycle formed by
/// the path from its first occurrence.
///
/// # Examples
///
/// ```rust
/// use trellis::{ComponentDescriptor, ContainerError, ResolutionStack};
///
/// struct A;
/// struct B;
///
/// let a = ComponentDescriptor::builder::<A>().construct(|_| Ok(A)).build().unwrap();
/// let b = ComponentDescriptor::builder::<B>().construct(|_| Ok(B)).build().unwrap();
///
/// let mut stack = ResolutionStack::new();
/// stack.enter(a.info()).unwrap();
/// stack.enter(b.info()).unwrap();
/// match stack.enter(a.info()) {
///     Err(ContainerError::CircularDependency { cycle }) => {
///         assert_eq!(cycle, vec![a.info(), b.info()]);
///     }
///     other => panic!("expected a cycle, got {other:?}"),
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ResolutionStack {
    path: Vec<ComponentInfo>,
}

impl ResolutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `component` onto the path unless it is already there.
    pub fn enter(&mut self, component: ComponentInfo) -> Result<(), ContainerError> {
        if let Some(index) = self.path.iter().position(|c| c.id() == component.id()) {
            return Err(ContainerError::CircularDependency {
                cycle: self.path[index..].to_vec(),
            });
        }
        self.path.push(component);
        Ok(())
    }

    /// Pops the most recently entered component.
    pub fn exit(&mut self) -> Option<ComponentInfo> {
        self.path.pop()
    }

    pub fn path(&self) -> &[ComponentInfo] {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// A constructed instance whose field dependencies are not wired yet.
struct PendingField {
    descriptor: Arc<ComponentDescriptor>,
    instance: Instance,
    chain: Vec<(ComponentInfo, Scope)>,
}

/// State of one top-level request.
#[derive(Default)]
struct Resolution {
    /// Components whose construction led to the one being constructed now,
    /// across field injections.
    chain: Vec<(ComponentInfo, Scope)>,
    pending: VecDeque<PendingField>,
    /// Singletons constructed by this request.
    created: Vec<DescriptorId>,
}

pub(crate) struct Resolver<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) scopes: &'a ScopeManager,
    pub(crate) metrics: &'a Metrics,
    pub(crate) config: &'a ContextConfig,
}

impl Resolver<'_> {
    /// Resolves `capability` and wires every field dependency created on the way.
    pub(crate) fn get(&self, capability: Capability) -> Result<Resolved, ContainerError> {
        let mut resolution = Resolution::default();
        let result = self.resolve(capability, &mut resolution);
        // Singletons created before a failure stay cached and must be wired anyway.
        let wired = self.inject_fields(&mut resolution);
        if wired.is_err() {
            // Instances that may hold an unwired field must not be handed out later.
            for id in resolution.created.drain(..) {
                self.scopes.evict(id);
            }
        }
        let result = result.and_then(|value| wired.map(|_| value));
        if let Err(err) = &result {
            if self.config.metrics {
                self.metrics.record_error();
            }
            tracing::debug!(
                capability = capability.name(),
                error = %err,
                "Cannot resolve capability"
            );
        }
        result
    }

    fn resolve(
        &self,
        capability: Capability,
        resolution: &mut Resolution,
    ) -> Result<Resolved, ContainerError> {
        tracing::trace!(capability = capability.name(), "Resolving capability");
        let binding = self.registry.binding(capability)?;
        let descriptor = &binding.descriptor;
        let cached = match descriptor.scope() {
            Scope::Singleton => self.scopes.get(descriptor.id()),
            Scope::Prototype => None,
        };
        let instance = match cached {
            Some(instance) => instance,
            None => {
                self.check_acyclic(descriptor)?;
                self.instance_of(descriptor, resolution)?
            }
        };
        descriptor
            .provides(binding.provides)
            .cast(instance)
            .ok_or(ContainerError::TypeMismatch {
                component: descriptor.name(),
                expected: capability.name(),
            })
    }

    fn instance_of(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        resolution: &mut Resolution,
    ) -> Result<Instance, ContainerError> {
        match descriptor.scope() {
            Scope::Singleton => {
                if let Some(instance) = self.scopes.get(descriptor.id()) {
                    return Ok(instance);
                }
                check_reentry(descriptor.info())?;
                self.scopes
                    .get_or_create(descriptor.id(), || self.construct(descriptor, resolution))
            }
            Scope::Prototype => self.construct(descriptor, resolution),
        }
    }

    /// Rejects constructor dependency cycles reachable from `descriptor`.
    ///
    /// Runs before any instance is created, so no singleton cell is ever locked
    /// by a request that would come back to it.
    fn check_acyclic(&self, descriptor: &ComponentDescriptor) -> Result<(), ContainerError> {
        if self.registry.is_acyclic(descriptor.id()) {
            return Ok(());
        }
        self.check_dependencies(descriptor, &mut ResolutionStack::new())
    }

    fn check_dependencies(
        &self,
        descriptor: &ComponentDescriptor,
        stack: &mut ResolutionStack,
    ) -> Result<(), ContainerError> {
        if self.registry.is_acyclic(descriptor.id()) {
            return Ok(());
        }
        stack.enter(descriptor.info())?;
        for dependency in descriptor.dependencies() {
            match self.registry.binding(dependency.capability()) {
                Ok(binding) => self.check_dependencies(&binding.descriptor, stack)?,
                Err(err) if dependency.is_optional() && err.is_missing_binding() => {}
                Err(err) => return Err(err.required_by(descriptor.info())),
            }
        }
        stack.exit();
        self.registry.mark_acyclic(descriptor.id());
        Ok(())
    }

    fn construct(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        resolution: &mut Resolution,
    ) -> Result<Instance, ContainerError> {
        let info = descriptor.info();
        // Prototypes reached again through prototypes only would never stop.
        if descriptor.scope() == Scope::Prototype
            && let Some(index) = resolution.chain.iter().position(|(c, _)| c.id() == info.id())
            && resolution.chain[index..]
                .iter()
                .all(|(_, scope)| *scope == Scope::Prototype)
        {
            return Err(ContainerError::CircularDependency {
                cycle: resolution.chain[index..].iter().map(|(c, _)| *c).collect(),
            });
        }
        resolution.chain.push((info, descriptor.scope()));
        let constructing = Constructing::enter(info);
        let result = self.construct_with_dependencies(descriptor, resolution);
        drop(constructing);
        resolution.chain.pop();
        if result.is_ok() && descriptor.scope() == Scope::Singleton {
            resolution.created.push(descriptor.id());
        }
        result
    }

    fn construct_with_dependencies(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        resolution: &mut Resolution,
    ) -> Result<Instance, ContainerError> {
        let info = descriptor.info();
        let mut values = Vec::with_capacity(descriptor.dependencies().len());
        for dependency in descriptor.dependencies() {
            if dependency.is_optional() && !self.has_binding(dependency.capability()) {
                values.push((dependency, None));
                continue;
            }
            let value = self
                .resolve(dependency.capability(), resolution)
                .map_err(|err| err.required_by(info))?;
            values.push((dependency, Some(value)));
        }
        let arguments = Arguments::new(info, values);
        let started = Instant::now();
        let instance = descriptor.construct(&arguments).map_err(|err| {
            match err.downcast::<ContainerError>() {
                Ok(err) => *err,
                Err(source) => ContainerError::ConstructionFailed {
                    component: info,
                    source,
                },
            }
        })?;
        let elapsed = started.elapsed();
        tracing::trace!(
            component = info.name(),
            scope = %descriptor.scope(),
            elapsed = ?elapsed,
            "Component constructed"
        );
        if elapsed > self.config.slow_construction_threshold {
            tracing::warn!(
                component = info.name(),
                elapsed = ?elapsed,
                threshold = ?self.config.slow_construction_threshold,
                "Slow component construction"
            );
        }
        if self.config.metrics {
            self.metrics.record_construction(info, elapsed);
        }
        if !descriptor.fields().is_empty() {
            resolution.pending.push_back(PendingField {
                descriptor: Arc::clone(descriptor),
                instance: Arc::clone(&instance),
                chain: resolution.chain.clone(),
            });
        }
        Ok(instance)
    }

    /// Wires field dependencies of every instance created by this request.
    ///
    /// Keeps going after a failure so that the remaining instances are wired,
    /// and returns the first error.
    fn inject_fields(&self, resolution: &mut Resolution) -> Result<(), ContainerError> {
        let mut first_error = None;
        while let Some(pending) = resolution.pending.pop_front() {
            let info = pending.descriptor.info();
            for field in pending.descriptor.fields() {
                let dependency = field.dependency();
                if dependency.is_optional() && !self.has_binding(dependency.capability()) {
                    continue;
                }
                resolution.chain.clone_from(&pending.chain);
                let result = self
                    .resolve(dependency.capability(), resolution)
                    .and_then(|value| field.inject(&pending.instance, value))
                    .map_err(|err| err.required_by(info));
                match result {
                    Ok(()) => {
                        tracing::trace!(
                            component = info.name(),
                            field = dependency.name(),
                            "Field injected"
                        );
                    }
                    Err(err) => {
                        tracing::debug!(
                            component = info.name(),
                            field = dependency.name(),
                            error = %err,
                            "Cannot inject field"
                        );
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        resolution.chain.clear();
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn has_binding(&self, capability: Capability) -> bool {
        match self.registry.binding(capability) {
            Ok(_) => true,
            Err(err) => !err.is_missing_binding(),
        }
    }

    /// Checks the whole registry without constructing anything.
    ///
    /// Reports every missing or ambiguous required dependency and every
    /// constructor cycle, each once.
    pub(crate) fn validate(&self) -> Result<(), Vec<ContainerError>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut report = |err: ContainerError| {
            let err = normalize(err);
            if seen.insert(err.to_string()) {
                errors.push(err);
            }
        };
        for descriptor in self.registry.components() {
            if let Err(err) = self.check_dependencies(descriptor, &mut ResolutionStack::new()) {
                report(err);
            }
            for dependency in descriptor.field_dependencies() {
                if dependency.is_optional() {
                    continue;
                }
                if let Err(err) = self.registry.binding(dependency.capability()) {
                    report(err.required_by(descriptor.info()));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Rotates a reported cycle to start at its earliest registered component.
fn normalize(err: ContainerError) -> ContainerError {
    match err {
        ContainerError::CircularDependency { mut cycle } => {
            if let Some(start) = cycle
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.id())
                .map(|(index, _)| index)
            {
                cycle.rotate_left(start);
            }
            ContainerError::CircularDependency { cycle }
        }
        err => err,
    }
}
