//! Providers looked up by name.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use dashmap::DashMap;

use crate::container::Container;
use crate::provider::{BoxError, Provider};

/// A set of independently configured providers of the same type, keyed by
/// name ("primary", "replica", ...).
///
/// The first registration of a name wins: later calls with the same name
/// return the existing provider and ignore their constructor. A registry
/// normally lives for the whole process, e.g. in a `static` behind
/// `once_cell::sync::Lazy`, one per component type.
pub struct NamedProviders<T> {
    providers: DashMap<String, Arc<Provider<T>>>,
}

impl<T> NamedProviders<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Return the provider registered under `name`, creating it with
    /// `constructor` if the name is new.
    #[track_caller]
    pub fn get_provider<F, Fut>(&self, name: &str, constructor: F) -> Arc<Provider<T>>
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        if let Some(existing) = self.providers.get(name) {
            return Arc::clone(&existing);
        }

        let origin = Location::caller();
        let entry = self
            .providers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(name = %name, origin = %origin, "Registering named provider");
                Arc::new(Provider::with_origin(constructor, origin))
            });
        Arc::clone(&entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<T> Default for NamedProviders<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
