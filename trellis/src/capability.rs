use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies something a caller can ask the container for.
///
/// A capability is either an interface (a trait object such as `dyn UserRepository`)
/// or a concrete type. Components advertise one or more capabilities and callers
/// request instances by capability.
///
/// # Examples
///
/// ```rust
/// use trellis::Capability;
///
/// trait Clock: Send + Sync {}
///
/// let capability = Capability::of::<dyn Clock>();
/// assert!(capability.name().contains("Clock"));
/// assert_eq!(capability, Capability::of::<dyn Clock>());
/// assert_ne!(capability, Capability::of::<String>());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    /// Creates the capability for the type `T`.
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the type name of this capability.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Process-unique identity of a registered component descriptor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DescriptorId(u64);

impl DescriptorId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity and name of a component, as carried by diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComponentInfo {
    id: DescriptorId,
    name: &'static str,
}

impl ComponentInfo {
    pub(crate) fn new(id: DescriptorId, name: &'static str) -> Self {
        Self { id, name }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Returns the type name of the component implementation.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
