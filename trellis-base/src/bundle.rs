use trellis::{ApplicationContext, ContainerError};

/// Groups registrations into one named startup step.
pub trait BundleExt {
    fn add_bundle<F>(&self, name: &str, func: F) -> Result<&Self, ContainerError>
    where
        F: FnOnce(&Self) -> Result<(), ContainerError>;
}

impl BundleExt for ApplicationContext {
    fn add_bundle<F>(&self, name: &str, func: F) -> Result<&Self, ContainerError>
    where
        F: FnOnce(&Self) -> Result<(), ContainerError>,
    {
        let before = self.stats().registered_components;
        func(self)?;
        tracing::debug!(
            bundle = name,
            components = self.stats().registered_components.saturating_sub(before),
            "Bundle registered"
        );
        Ok(self)
    }
}
