//! Provider subsystem.
//!
//! # Data Flow
//! ```text
//! Provider::get(container)
//!     → container cache hit? return Arc<T>
//!     → provider lock → re-check cache
//!     → constructor(container.clone())   (may get other providers,
//!                                          register checks/closers)
//!     → container.store(ProviderId, Arc<T>)
//!
//! NamedProviders::get_provider(name, ctor)
//!     → existing Provider for name, or a new one built from ctor
//! ```
//!
//! # Design Decisions
//! - The cache key is the provider's identity, never the type or a name
//! - Instances are type-erased as `Arc<dyn Any + Send + Sync>` inside the container
//! - The container lock is never held while a constructor runs

pub mod registry;
pub mod typed;

pub use registry::NamedProviders;
pub use typed::{Provider, ProviderId};

/// Error type returned by constructors and closers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
