//! Service lifecycle and dependency injection runtime.
//!
//! A [`Container`] owns one run of a service: lazily constructed
//! singletons obtained through [`Provider`]s, the health checks and closers
//! registered while building them, and the configuration sections they read.

pub mod config;
pub mod container;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod provider;

pub use config::{ConfigEnv, ConfigError, ConfigManager, ConfigSource};
pub use container::{Container, Site, DEFAULT_CLOSE_TIMEOUT};
pub use health::{HealthError, HealthScheduler, Level};
pub use lifecycle::{Context, ContextError, Shutdown, ShutdownError};
pub use provider::{BoxError, NamedProviders, Provider};
