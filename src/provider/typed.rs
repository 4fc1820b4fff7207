//! Memoizing factory for one component type.

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::Mutex;

use crate::container::Container;
use crate::observability::metrics;
use crate::provider::BoxError;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Provider`]; the key of a container's
/// instance cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    fn next() -> Self {
        Self(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Constructor<T> = Box<dyn Fn(Container) -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Wraps the constructor of one component type.
///
/// A provider is usually created once per process (in a `static`) and used
/// against any number of containers. Each container caches at most one
/// instance per provider.
///
/// ```ignore
/// static ENGINE: Lazy<Provider<Engine>> = Lazy::new(|| {
///     Provider::new(|c| async move {
///         let engine = Engine::default();
///         c.on_close(|| async { Ok(()) });
///         Ok(engine)
///     })
/// });
///
/// let engine = ENGINE.get(&container).await?;
/// ```
pub struct Provider<T> {
    id: ProviderId,
    origin: &'static Location<'static>,
    constructor: Constructor<T>,
    /// Serializes construction so concurrent first `get`s build once.
    lock: Mutex<()>,
}

impl<T> Provider<T>
where
    T: Send + Sync + 'static,
{
    /// Create a provider from an async constructor.
    ///
    /// The constructor receives a clone of the container it is building for,
    /// so it can fetch other providers and register health checks and closers.
    #[track_caller]
    pub fn new<F, Fut>(constructor: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self::with_origin(constructor, Location::caller())
    }

    pub(crate) fn with_origin<F, Fut>(constructor: F, origin: &'static Location<'static>) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self {
            id: ProviderId::next(),
            origin,
            constructor: Box::new(move |container: Container| constructor(container).boxed()),
            lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Where the provider was created.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// Return the cached instance, constructing it on first use.
    ///
    /// Constructor errors are returned unchanged and nothing is cached.
    /// A constructor must not `get` its own provider.
    pub async fn get(&self, container: &Container) -> Result<Arc<T>, BoxError> {
        if let Some(instance) = container.instance::<T>(self.id) {
            return Ok(instance);
        }

        let _guard = self.lock.lock().await;
        if let Some(instance) = container.instance::<T>(self.id) {
            return Ok(instance);
        }

        let instance = self.build(container).await?;
        container.store(self.id, instance.clone());
        Ok(instance)
    }

    /// Like [`get`](Self::get), panicking on constructor failure.
    pub async fn must_get(&self, container: &Container) -> Arc<T> {
        match self.get(container).await {
            Ok(instance) => instance,
            Err(e) => self.fail("get", e),
        }
    }

    /// Always run the constructor. The cache is neither read nor written.
    pub async fn get_new(&self, container: &Container) -> Result<Arc<T>, BoxError> {
        self.build(container).await
    }

    pub async fn must_get_new(&self, container: &Container) -> Arc<T> {
        match self.get_new(container).await {
            Ok(instance) => instance,
            Err(e) => self.fail("get_new", e),
        }
    }

    /// Replace the cached instance without running the constructor.
    pub fn set(&self, container: &Container, instance: Arc<T>) {
        container.store(self.id, instance);
    }

    /// Construct a new instance and swap it into the cache.
    ///
    /// The swap happens only after the constructor succeeded; on failure the
    /// previous instance stays cached.
    pub async fn refresh(&self, container: &Container) -> Result<Arc<T>, BoxError> {
        let _guard = self.lock.lock().await;
        let instance = self.build(container).await?;
        container.store(self.id, instance.clone());
        Ok(instance)
    }

    pub async fn must_refresh(&self, container: &Container) -> Arc<T> {
        match self.refresh(container).await {
            Ok(instance) => instance,
            Err(e) => self.fail("refresh", e),
        }
    }

    pub fn is_set(&self, container: &Container) -> bool {
        container.contains(self.id)
    }

    async fn build(&self, container: &Container) -> Result<Arc<T>, BoxError> {
        let started = Instant::now();
        let result = (self.constructor)(container.clone()).await;

        match &result {
            Ok(_) => tracing::debug!(
                provider = type_name::<T>(),
                origin = %self.origin,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Provider constructed instance"
            ),
            Err(e) => tracing::warn!(
                provider = type_name::<T>(),
                origin = %self.origin,
                error = %e,
                "Provider constructor failed"
            ),
        }
        metrics::record_construction(type_name::<T>(), result.is_ok());

        result.map(Arc::new)
    }

    fn fail(&self, op: &str, err: BoxError) -> ! {
        panic!(
            "provider {} (created at {}) failed to {}: {}",
            type_name::<T>(),
            self.origin,
            op,
            err
        )
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("type", &type_name::<T>())
            .field("origin", &format_args!("{}", self.origin))
            .finish()
    }
}
