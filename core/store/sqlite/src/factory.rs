//! Initialise SQLite Persistent Store.
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use serde_json::Value as Json;
use tokio_rusqlite::Connection;

use authcore_context::Context;
use authcore_store::Store;
use authcore_store::StoreFactory;
use authcore_store::StoreFactoryArgs;
use authcore_store::StoreFactorySyncArgs;

use crate::Conf;
use crate::ConfError;

/// Special path requesting the use of an in-memory store.
pub const MEMORY_PATH: &str = ":memory:";

/// Name of the table to store refinery migration metadata into.
pub const REFINERY_SCHEMA_TABLE_NAME: &str = "refinery_schema_history__store";

/// Initialise SQLite Persistent Store.
pub struct SQLiteFactory;

#[async_trait::async_trait]
impl StoreFactory for SQLiteFactory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        serde_json::from_value::<Conf>(conf.clone()).context(ConfError)?;
        Ok(())
    }

    fn register_metrics(&self, registry: &prometheus::Registry) -> Result<()> {
        crate::telemetry::register_metrics(registry)
    }

    async fn store<'a>(&self, args: StoreFactoryArgs<'a>) -> Result<Store> {
        let conf: Conf = serde_json::from_value(args.conf.clone()).context(ConfError)?;
        let client = create_client(args.context, &conf).await?;

        // In-memory DBs are private to their connection so must be migrated here.
        if conf.path == MEMORY_PATH {
            migrate(&client).await?;
        }
        let store = crate::statements::SQLiteStore::new(client);
        Ok(Store::from(store))
    }

    async fn sync<'a>(&self, args: StoreFactorySyncArgs<'a>) -> Result<()> {
        let conf: Conf = serde_json::from_value(args.conf.clone()).context(ConfError)?;
        let client = create_client(args.context, &conf).await?;
        migrate(&client).await
    }
}

/// Create a SQLite DB [`Connection`] to the persistent store.
///
/// The special [`MEMORY_PATH`] constant can be specified to create an in-memory store.
///
/// NOTE:
///   The use of an in-memory store is only intended for tests and experimentation
///   as all data will be lost as soon as the process terminates.
pub(crate) async fn create_client(context: &Context, conf: &Conf) -> Result<Connection> {
    // Open or create the SQLite DB.
    let connection = if conf.path == MEMORY_PATH {
        slog::warn!(
            context.logger,
            "Using in-memory store means data will be lost once the process terminates"
        );
        Connection::open_in_memory().await
    } else {
        Connection::open(&conf.path).await
    };
    let connection = connection?;

    // Wait for concurrent writers instead of failing straight away.
    let busy_timeout = Duration::from_millis(conf.busy_timeout_ms);
    connection
        .call(move |connection| {
            connection.busy_timeout(busy_timeout)?;
            Ok(())
        })
        .await?;
    Ok(connection)
}

/// Run schema migrations to ensure the DB is ready for use.
pub(crate) async fn migrate(client: &Connection) -> Result<()> {
    let init_error: Arc<Mutex<Option<refinery::Error>>> = Default::default();
    let init_error_inner = Arc::clone(&init_error);
    client
        .call(move |connection| {
            let result = crate::schema::migrations::runner()
                .set_migration_table_name(REFINERY_SCHEMA_TABLE_NAME)
                .run(connection);
            if let Err(error) = result {
                init_error_inner
                    .lock()
                    .expect("SQLiteStore migration error lock poisoned")
                    .replace(error);
            }
            Ok(())
        })
        .await?;

    // Extract the migration error, if any.
    let error = init_error
        .lock()
        .expect("SQLiteStore migration error lock poisoned")
        .take();
    if let Some(error) = error {
        return Err(error.into());
    }
    Ok(())
}
