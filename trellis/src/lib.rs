//! # trellis
//!
//! An inversion of control container for Rust applications. Components declare
//! the capabilities they provide and the capabilities they depend on; the
//! container builds them lazily on first request, shares singletons, creates
//! prototypes on every request and reports circular dependencies instead of
//! recursing forever.
//!
//! ## Core Concepts
//!
//! - **Capability**: what a caller asks for, either an interface (`dyn Trait`) or a concrete type
//! - **Component Descriptor**: immutable registration record of one component
//! - **Registry**: maps capabilities to descriptors and picks the primary one on ties
//! - **Scope**: `Singleton` (one shared instance) or `Prototype` (new instance per request)
//! - **Application Context**: the container callers register with and resolve from
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::{ApplicationContext, ComponentDescriptor};
//!
//! trait UserRepository: Send + Sync {
//!     fn name(&self, id: u32) -> Option<String>;
//! }
//!
//! struct MemoryUserRepository;
//!
//! impl UserRepository for MemoryUserRepository {
//!     fn name(&self, id: u32) -> Option<String> {
//!         (id == 1).then(|| "alice".to_string())
//!     }
//! }
//!
//! struct UserService {
//!     repository: Arc<dyn UserRepository>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ApplicationContext::new();
//! context.register(
//!     ComponentDescriptor::builder::<MemoryUserRepository>()
//!         .provides(|c| c as Arc<dyn UserRepository>)
//!         .construct(|_| Ok(MemoryUserRepository))
//!         .build()?,
//! )?;
//! context.register(
//!     ComponentDescriptor::builder::<UserService>()
//!         .depends_on::<dyn UserRepository>("repository")
//!         .construct(|args| {
//!             Ok(UserService {
//!                 repository: args.required("repository")?,
//!             })
//!         })
//!         .build()?,
//! )?;
//!
//! let service = context.get::<UserService>()?;
//! assert_eq!(service.repository.name(1).as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Field Injection
//!
//! Two components can refer to each other when one side of the cycle is
//! injected into a field after construction:
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::{ApplicationContext, Autowired, ComponentDescriptor};
//!
//! struct Orders {
//!     billing: Arc<Billing>,
//! }
//!
//! struct Billing {
//!     orders: Autowired<Orders>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ApplicationContext::new();
//! context.register(
//!     ComponentDescriptor::builder::<Orders>()
//!         .depends_on::<Billing>("billing")
//!         .construct(|args| Ok(Orders { billing: args.required("billing")? }))
//!         .build()?,
//! )?;
//! context.register(
//!     ComponentDescriptor::builder::<Billing>()
//!         .field::<Orders, _>("orders", |billing, orders| {
//!             billing.orders.wire(orders);
//!         })
//!         .construct(|_| Ok(Billing { orders: Autowired::new() }))
//!         .build()?,
//! )?;
//!
//! let orders = context.get::<Orders>()?;
//! let back = orders.billing.orders.get().expect("wired after resolution");
//! assert!(Arc::ptr_eq(&orders, &back));
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Macros
//!
//! With the `macros` feature enabled, descriptors are derived from the struct:
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::{ApplicationContext, Component};
//!
//! #[derive(Component)]
//! struct Clock;
//!
//! #[derive(Component)]
//! #[component(scope = "prototype", stereotype = "service")]
//! struct Scheduler {
//!     clock: Arc<Clock>,
//!     #[inject(default)]
//!     jobs: Vec<String>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ApplicationContext::new();
//! context.register_component::<Clock>()?;
//! context.register_component::<Scheduler>()?;
//!
//! let first = context.get::<Scheduler>()?;
//! let second = context.get::<Scheduler>()?;
//! assert!(!Arc::ptr_eq(&first, &second));
//! assert!(Arc::ptr_eq(&first.clock, &second.clock));
//! assert!(first.jobs.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables `#[derive(Component)]` and `#[injectable]`

mod capability;
mod context;
mod descriptor;
mod error;
mod inject;
mod metrics;
mod registry;
mod resolver;
mod scope;

pub use capability::*;
pub use context::*;
pub use descriptor::*;
pub use error::*;
pub use inject::*;
pub use metrics::*;
pub use registry::*;
pub use resolver::*;

#[cfg(feature = "macros")]
pub use trellis_macros::*;
