use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;

use crate::{Capability, ComponentDescriptor, ContainerError, DescriptorId};

/// One component advertising one capability.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) descriptor: Arc<ComponentDescriptor>,
    /// Index into the descriptor's provided capabilities.
    pub(crate) provides: usize,
}

/// Registered descriptors, indexed by the capabilities they advertise.
///
/// Registration validates primary uniqueness before inserting anything, so a
/// rejected descriptor leaves the registry unchanged.
#[derive(Default)]
pub struct Registry {
    components: Vec<Arc<ComponentDescriptor>>,
    bindings: HashMap<TypeId, Vec<Binding>>,
    acyclic: DashSet<DescriptorId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor under every capability it advertises.
    pub fn register(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<Arc<ComponentDescriptor>, ContainerError> {
        if descriptor.is_primary() {
            for capability in descriptor.capabilities() {
                let existing = self
                    .bindings
                    .get(&capability.id())
                    .into_iter()
                    .flatten()
                    .find(|b| b.descriptor.is_primary());
                if let Some(existing) = existing {
                    return Err(ContainerError::AmbiguousPrimary {
                        capability,
                        existing: existing.descriptor.info(),
                        conflicting: descriptor.info(),
                    });
                }
            }
        }
        let descriptor = Arc::new(descriptor);
        for (index, capability) in descriptor.capabilities().enumerate() {
            self.bindings
                .entry(capability.id())
                .or_default()
                .push(Binding {
                    descriptor: Arc::clone(&descriptor),
                    provides: index,
                });
        }
        self.components.push(Arc::clone(&descriptor));
        // New bindings can close cycles through components already checked.
        self.acyclic.clear();
        Ok(descriptor)
    }

    /// Returns the descriptor that serves requests for `capability`.
    ///
    /// A single binding is returned as is. Among several bindings the one marked
    /// primary wins; without a primary the lookup is ambiguous.
    pub fn lookup(
        &self,
        capability: Capability,
    ) -> Result<&Arc<ComponentDescriptor>, ContainerError> {
        self.binding(capability).map(|b| &b.descriptor)
    }

    pub(crate) fn binding(&self, capability: Capability) -> Result<&Binding, ContainerError> {
        let bindings = match self.bindings.get(&capability.id()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(ContainerError::UnresolvedDependency {
                    capability,
                    required_by: None,
                });
            }
        };
        if let [binding] = bindings.as_slice() {
            return Ok(binding);
        }
        match bindings.iter().find(|b| b.descriptor.is_primary()) {
            Some(binding) => Ok(binding),
            None => Err(ContainerError::AmbiguousBinding {
                capability,
                candidates: bindings.iter().map(|b| b.descriptor.info()).collect(),
                required_by: None,
            }),
        }
    }

    /// Returns `true` if at least one component advertises `capability`.
    pub fn contains(&self, capability: Capability) -> bool {
        self.bindings
            .get(&capability.id())
            .is_some_and(|v| !v.is_empty())
    }

    /// Returns all descriptors in registration order.
    pub fn components(&self) -> &[Arc<ComponentDescriptor>] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn clear(&mut self) {
        self.components.clear();
        self.bindings.clear();
        self.acyclic.clear();
    }

    pub(crate) fn is_acyclic(&self, id: DescriptorId) -> bool {
        self.acyclic.contains(&id)
    }

    pub(crate) fn mark_acyclic(&self, id: DescriptorId) {
        self.acyclic.insert(id);
    }
}
