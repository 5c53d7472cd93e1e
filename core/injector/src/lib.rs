//! Dependency injection to enable easy access to Process Global resources.
use std::sync::RwLock;

use once_cell::sync::Lazy;

use authcore_cluster::CacheInvalidator;
use authcore_conf::Conf;
use authcore_context::Context;
use authcore_events::emit::Events;
use authcore_store::Store;

mod init;

pub use self::init::store_factory;
pub use self::init::UnsupportedStoreBackend;
pub use self::init::STORE_BACKEND_SQLITE;

/// Singleton instance of the Process Globals container.
static GLOBAL_INJECTOR: Lazy<RwLock<Option<Injector>>> = Lazy::new(|| RwLock::new(None));

/// Container for all process global dependencies to be injected in other components.
#[derive(Clone)]
pub struct Injector {
    /// Process global configuration.
    pub conf: Conf,

    /// Root context for the process.
    pub context: Context,

    /// Sink for group lifecycle events.
    pub events: Events,

    /// Cluster-wide identity cache invalidation.
    pub invalidator: CacheInvalidator,

    /// Interface to the persistent store.
    pub store: Store,
}

impl Injector {
    /// Get the globally set [`Injector`] instance.
    ///
    /// # Panics
    ///
    /// Panics if no [`Injector`] was set during process initialisation.
    pub fn global() -> Injector {
        GLOBAL_INJECTOR
            .read()
            .expect("GLOBAL_INJECTOR RwLock poisoned")
            .as_ref()
            .expect("global injector is not initialised")
            .clone()
    }

    /// Set the [`Injector`] instance for the process to fetch with [`Injector::global`].
    ///
    /// # Panics
    ///
    /// Panics if an [`Injector`] has already been set.
    pub fn set_global(injector: Injector) {
        let mut global_injector = GLOBAL_INJECTOR
            .write()
            .expect("GLOBAL_INJECTOR RwLock poisoned");

        // If the global injector is already initialised panic (without poisoning the lock).
        if global_injector.is_some() {
            drop(global_injector);
            panic!("global injector already initialised");
        }

        slog::trace!(
            injector.context.logger,
            "Initialising Global Injector for the process"
        );
        *global_injector = Some(injector);
    }
}

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::InjectorFixture;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture {
    use authcore_cluster::CacheInvalidator;
    use authcore_cluster::ClusterFixture;
    use authcore_cluster::IdentityCacheFixture;
    use authcore_conf::BackendConf;
    use authcore_conf::Conf;
    use authcore_context::Context;
    use authcore_events::emit::Events;
    use authcore_events::emit::EventsFixture;
    use authcore_store::Store;
    use authcore_store::StoreFixture;

    use super::Injector;

    /// Number of simulated peers in the fixture cluster.
    const FIXTURE_PEERS: usize = 2;

    /// [`Injector`] for unit tests with access to the fixtures backing it.
    pub struct InjectorFixture {
        /// Simulated cluster peers notified by the invalidator.
        pub cluster: ClusterFixture,

        /// Introspection of emitted events.
        pub events: EventsFixture,

        /// Simulated local identity cache.
        pub identity_cache: IdentityCacheFixture,

        /// The [`Injector`] wired to all the fixtures.
        pub injector: Injector,

        /// In-memory store backing the injected [`Store`].
        pub store: StoreFixture,
    }

    impl Injector {
        /// [`Injector`] instance to be used with unit tests.
        pub fn fixture() -> InjectorFixture {
            let conf = Conf {
                cluster: Default::default(),
                groups: Default::default(),
                store: BackendConf {
                    backend: "fixture".into(),
                    options: serde_json::Value::Null,
                },
            };
            let cluster = ClusterFixture::new(FIXTURE_PEERS);
            let events = EventsFixture::new();
            let identity_cache = IdentityCacheFixture::default();
            let store = StoreFixture::default();
            let invalidator = CacheInvalidator::new(
                cluster.clone(),
                identity_cache.clone(),
                conf.cluster.notify_timeout(),
            );
            let injector = Injector {
                conf,
                context: Context::fixture(),
                events: Events::from(events.backend()),
                invalidator,
                store: Store::from(store.clone()),
            };
            InjectorFixture {
                cluster,
                events,
                identity_cache,
                injector,
                store,
            }
        }
    }
}
