use std::sync::Arc;

use trellis::{ApplicationContext, ComponentDescriptor, ContextConfig};

use crate::{Config, StdError, Tracing};

/// Builds an application context from configuration.
///
/// The context is configured from the `container` section and installs the
/// subscriber described by the `tracing` section when there is one. The
/// configuration and the tracing handle are registered as components, so other
/// components can depend on `Config` and `Tracing`.
pub fn bootstrap(config: &Config) -> Result<ApplicationContext, StdError> {
    let tracing = Tracing::init(config)?;
    let context_config = config.section::<ContextConfig>()?.unwrap_or_default();
    let context = ApplicationContext::with_config(context_config);
    context.register(ComponentDescriptor::instance(Arc::new(config.clone())).build()?)?;
    if let Some(tracing) = tracing {
        context.register(ComponentDescriptor::instance(Arc::new(tracing)).build()?)?;
    }
    tracing::debug!(sections = config.len(), "Application context bootstrapped");
    Ok(context)
}
