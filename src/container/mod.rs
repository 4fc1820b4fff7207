//! The aggregation root for one run of the system.
//!
//! # Data Flow
//! ```text
//! start-up:
//!     Container::new → load_config(dir, env) → Provider::get(&container)
//!         constructors → on_health_check / on_close / watch_config
//!
//! running:
//!     run_health_check(period, timeout, handler) → periodic check_health
//!
//! teardown:
//!     close / close_with_context → stop scheduler → closers in parallel
//!         → ShutdownError (empty ⇒ Ok)
//! ```
//!
//! # Design Decisions
//! - One lock guards instances, hooks, config and the scheduler handle
//! - The lock is held only for the mutation itself, never across a
//!   constructor, check, closer, config callback or handler
//! - Hook registration is append-only and safe from inside constructors

mod close;
mod health;
mod hooks;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};

use futures_util::future::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::config::{ConfigEnv, ConfigError, ConfigManager, ConfigSource};
use crate::health::HealthError;
use crate::lifecycle::Shutdown;
use crate::provider::{BoxError, ProviderId};

pub use close::DEFAULT_CLOSE_TIMEOUT;
pub use hooks::Site;
pub(crate) use hooks::{CheckFn, CloseFn, Hook};

#[derive(Default)]
struct State {
    instances: HashMap<ProviderId, Arc<dyn Any + Send + Sync>>,
    closers: Vec<Hook<CloseFn>>,
    checkers: Vec<Hook<CheckFn>>,
    config: Option<Arc<ConfigManager>>,
    scheduler: Option<Arc<Shutdown>>,
}

/// Owns every instance produced through providers, plus the health checks
/// and closers registered while producing them.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone, Default)]
pub struct Container {
    state: Arc<Mutex<State>>,
}

/// Non-owning handle used by background tasks.
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<Mutex<State>>);

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|state| Container { state })
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.state))
    }

    // --- Instance cache ---

    pub(crate) fn instance<T>(&self, id: ProviderId) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let erased = self.state.lock().instances.get(&id).cloned()?;
        erased.downcast::<T>().ok()
    }

    pub(crate) fn store<T>(&self, id: ProviderId, instance: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.state.lock().instances.insert(id, instance);
    }

    pub(crate) fn contains(&self, id: ProviderId) -> bool {
        self.state.lock().instances.contains_key(&id)
    }

    /// Number of instances currently cached.
    pub fn instance_count(&self) -> usize {
        self.state.lock().instances.len()
    }

    // --- Hooks ---

    /// Register a closer to run when the container is closed.
    ///
    /// Closers run concurrently and at most once. The call site is recorded
    /// and prefixes any error the closer produces.
    #[track_caller]
    pub fn on_close<F, Fut>(&self, closer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let site = Site::caller();
        let run: CloseFn = Box::new(move || closer().boxed());
        self.state.lock().closers.push(Hook { site, run });
    }

    /// Register a health check. `None` means healthy.
    ///
    /// The call site is recorded and prefixes the synthesized error if the
    /// check outlives a scan's deadline.
    #[track_caller]
    pub fn on_health_check<F, Fut>(&self, checker: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<HealthError>> + Send + 'static,
    {
        let site = Site::caller();
        let run: CheckFn = Arc::new(move || checker().boxed());
        self.state.lock().checkers.push(Hook { site, run });
    }

    pub fn closer_count(&self) -> usize {
        self.state.lock().closers.len()
    }

    pub fn health_check_count(&self) -> usize {
        self.state.lock().checkers.len()
    }

    // --- Configuration ---

    /// Load configuration sections for `env` from `dir`, replacing any
    /// previously loaded manager.
    pub fn load_config(&self, dir: impl AsRef<Path>, env: ConfigEnv) -> Result<(), ConfigError> {
        let manager = Arc::new(ConfigManager::load(dir, env)?);
        self.state.lock().config = Some(manager);
        Ok(())
    }

    /// The loaded configuration manager, if any.
    pub fn config(&self) -> Option<Arc<ConfigManager>> {
        self.state.lock().config.clone()
    }

    fn config_manager(&self) -> Result<Arc<ConfigManager>, ConfigError> {
        self.config().ok_or(ConfigError::NotLoaded)
    }

    /// See [`ConfigManager::unmarshal`].
    pub fn unmarshal_config<T>(&self, section: &str, default_content: &[u8]) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        self.config_manager()?.unmarshal(section, default_content)
    }

    /// See [`ConfigManager::watch`].
    pub fn watch_config<F>(&self, section: &str, on_change: F) -> Result<(), ConfigError>
    where
        F: Fn(&ConfigSource) + Send + Sync + 'static,
    {
        self.config_manager()?.watch(section, on_change)
    }

    /// See [`ConfigManager::unmarshal_and_watch`].
    pub fn unmarshal_and_watch_config<F>(
        &self,
        section: &str,
        default_content: &[u8],
        on_change: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&ConfigSource) + Send + Sync + 'static,
    {
        self.config_manager()?
            .unmarshal_and_watch(section, default_content, on_change)
    }

    // --- Scheduler handle ---

    fn replace_scheduler(&self, shutdown: Arc<Shutdown>) -> Option<Arc<Shutdown>> {
        self.state.lock().scheduler.replace(shutdown)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Container")
            .field("instances", &state.instances.len())
            .field("closers", &state.closers.len())
            .field("health_checks", &state.checkers.len())
            .field("config_loaded", &state.config.is_some())
            .field("scheduler", &state.scheduler.is_some())
            .finish()
    }
}
