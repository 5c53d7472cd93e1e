//! Initialise process global dependencies from the loaded configuration.
use anyhow::Context as AnyContext;
use anyhow::Result;

use authcore_cluster::CacheInvalidator;
use authcore_cluster::IdentityCache;
use authcore_conf::Conf;
use authcore_context::Context;
use authcore_events::emit::Events;
use authcore_events::emit::EventsNull;
use authcore_store::StoreFactory;
use authcore_store::StoreFactoryArgs;
use authcore_store_sqlite::SQLiteFactory;

use super::Injector;

/// ID of the SQLite persistent store backend.
pub const STORE_BACKEND_SQLITE: &str = "sqlite";

static SQLITE_FACTORY: SQLiteFactory = SQLiteFactory;

/// The configured persistent store backend is not known.
#[derive(Debug, thiserror::Error)]
#[error("persistent store backend '{0}' is not supported")]
pub struct UnsupportedStoreBackend(pub String);

/// Lookup the [`StoreFactory`] for the named backend.
pub fn store_factory(backend: &str) -> Result<&'static dyn StoreFactory> {
    match backend {
        STORE_BACKEND_SQLITE => Ok(&SQLITE_FACTORY),
        other => anyhow::bail!(UnsupportedStoreBackend(other.to_string())),
    }
}

impl Injector {
    /// Initialise all process dependencies and collect them into an [`Injector`].
    ///
    /// The configured store backend is validated and its metrics registered
    /// before the store client is created.
    /// Group events are discarded until a different [`Events`] sink is injected.
    pub async fn initialise<C>(
        context: Context,
        conf: Conf,
        cache: C,
        metrics: &prometheus::Registry,
    ) -> Result<Injector>
    where
        C: IdentityCache + 'static,
    {
        let factory = store_factory(&conf.store.backend)?;
        factory.conf_check(&context, &conf.store.options)?;
        factory.register_metrics(metrics)?;
        authcore_cluster::register_metrics(metrics)?;

        let store = factory
            .store(StoreFactoryArgs {
                conf: &conf.store.options,
                context: &context,
            })
            .await
            .with_context(|| format!("unable to initialise '{}' store", conf.store.backend))?;
        let invalidator = CacheInvalidator::from_conf(&conf.cluster, cache)?;
        slog::debug!(
            context.logger, "Process dependencies initialised";
            "store" => &conf.store.backend,
            "peers" => conf.cluster.peers.len(),
        );

        Ok(Injector {
            conf,
            context,
            events: Events::from(EventsNull),
            invalidator,
            store,
        })
    }
}
