//! # trellis-base
//!
//! Application plumbing around the trellis container: configuration sections,
//! tracing setup, registration bundles and text reports about a running
//! context.
//!
//! ## Core Components
//!
//! - **Configuration System**: JSON configuration made of named, typed sections
//! - **Tracing Integration**: `tracing-subscriber` setup driven by the `tracing` section
//! - **Bundle Management**: grouping of registrations into startup steps
//! - **Profiler**: construction metrics, validation results and the dependency graph
//!
//! ## Configuration Example
//!
//! ```rust
//! use std::time::Duration;
//! use trellis::ContextConfig;
//! use trellis_base::{Config, bootstrap};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = Config::parse(r#"{"container": {"slow_construction_threshold": "250ms"}}"#)?;
//! let context = bootstrap(&config)?;
//!
//! assert_eq!(
//!     context.config().slow_construction_threshold,
//!     Duration::from_millis(250),
//! );
//! assert!(context.get::<Config>()?.section::<ContextConfig>()?.is_some());
//! # Ok(())
//! # }
//! ```

mod bootstrap;
mod bundle;
mod config;
mod profiler;
mod tracing;

pub use bootstrap::*;
pub use bundle::*;
pub use config::*;
pub use profiler::*;
pub use self::tracing::*;

/// Error type of configuration and setup operations.
pub type StdError = Box<dyn std::error::Error + Send + Sync>;
