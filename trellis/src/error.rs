use thiserror::Error;

use crate::{Capability, ComponentInfo};

/// Type alias for boxed errors that can be sent across threads.
///
/// Component constructors return this error type, so any error implementing
/// [`std::error::Error`] can be propagated out of a constructor with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering or resolving components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    /// The component cannot be registered as declared.
    #[error("Invalid component {component}: {reason}")]
    InvalidComponent {
        component: &'static str,
        reason: String,
    },

    /// A second component claims to be primary for the same capability.
    #[error("Capability {capability} already has primary component {existing}, cannot add {conflicting} as primary")]
    AmbiguousPrimary {
        capability: Capability,
        existing: ComponentInfo,
        conflicting: ComponentInfo,
    },

    /// No component provides the requested capability.
    #[error("No component provides {capability}{}", fmt_required_by(.required_by))]
    UnresolvedDependency {
        capability: Capability,
        required_by: Option<ComponentInfo>,
    },

    /// Several components provide the requested capability and none of them is primary.
    #[error(
        "Capability {capability} is provided by {} and none of them is primary{}",
        fmt_components(.candidates),
        fmt_required_by(.required_by)
    )]
    AmbiguousBinding {
        capability: Capability,
        candidates: Vec<ComponentInfo>,
        required_by: Option<ComponentInfo>,
    },

    /// The constructor dependencies of a component lead back to the component.
    ///
    /// The cycle lists every component on it exactly once, starting with the
    /// component that was reached twice.
    #[error("Circular dependency detected: {}", fmt_cycle(.cycle))]
    CircularDependency { cycle: Vec<ComponentInfo> },

    /// The component constructor returned an error.
    #[error("Cannot construct {component}: {source}")]
    ConstructionFailed {
        component: ComponentInfo,
        #[source]
        source: crate::BoxError,
    },

    /// A constructor asked for a dependency it never declared.
    #[error("Component {component} has no declared dependency {parameter}")]
    UndeclaredDependency {
        component: &'static str,
        parameter: String,
    },

    /// A resolved value does not have the requested type.
    #[error("Component {component} cannot be provided as {expected}")]
    TypeMismatch {
        component: &'static str,
        expected: &'static str,
    },
}

impl ContainerError {
    /// Attaches the requesting component to lookup failures that do not name one yet.
    pub(crate) fn required_by(mut self, component: ComponentInfo) -> Self {
        match &mut self {
            Self::UnresolvedDependency { required_by, .. }
            | Self::AmbiguousBinding { required_by, .. } => {
                required_by.get_or_insert(component);
            }
            _ => {}
        }
        self
    }

    /// Returns `true` for failures that only mean "no unique binding exists".
    ///
    /// Optional dependencies turn these into an absent value.
    #[must_use]
    pub fn is_missing_binding(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedDependency { .. } | Self::AmbiguousBinding { .. }
        )
    }
}

fn fmt_required_by(required_by: &Option<ComponentInfo>) -> String {
    match required_by {
        Some(component) => format!(" (required by {component})"),
        None => String::new(),
    }
}

fn fmt_components(components: &[ComponentInfo]) -> String {
    components
        .iter()
        .map(ComponentInfo::name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_cycle(cycle: &[ComponentInfo]) -> String {
    let mut names: Vec<_> = cycle.iter().map(ComponentInfo::name).collect();
    if let Some(first) = cycle.first() {
        names.push(first.name());
    }
    names.join(" -> ")
}
