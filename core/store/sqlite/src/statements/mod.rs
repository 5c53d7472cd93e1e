//! SQL statements to implement the [`StoreBackend`] with SQLite.
use std::any::Any;

use anyhow::Result;
use opentelemetry_api::trace::FutureExt;
use rusqlite::TransactionBehavior;
use tokio_rusqlite::Connection;

use authcore_context::Context;
use authcore_errors::TransactionDeadlineExceeded;
use authcore_store::delete::DeleteOps;
use authcore_store::delete::DeleteResponses;
use authcore_store::persist::PersistOps;
use authcore_store::persist::PersistResponses;
use authcore_store::query::QueryOps;
use authcore_store::query::QueryResponses;
use authcore_store::StoreBackend;
use authcore_store::Transaction;
use authcore_store::TransactionBackend;
use authcore_store::TransactionBody;

mod entities;
mod groups;
mod members;
mod permissions;

/// implementation of the [`StoreBackend`] interface using SQLite.
pub struct SQLiteStore {
    /// Connection to the SQLite DB persisting data.
    connection: Connection,
}

impl SQLiteStore {
    /// Initialise a new SQLite backed [`StoreBackend`].
    pub fn new(connection: Connection) -> Self {
        SQLiteStore { connection }
    }
}

#[async_trait::async_trait]
impl StoreBackend for SQLiteStore {
    async fn transaction(
        &self,
        context: &Context,
        body: TransactionBody,
    ) -> Result<Box<dyn Any + Send>> {
        let (err_count, timer) = crate::telemetry::observe_op("transaction");
        let trace = crate::telemetry::trace_op("transaction");
        let tx_context = context.clone();
        let result = self
            .connection
            .call(move |connection| Ok(run_transaction(&tx_context, connection, body)))
            .with_context(trace.clone())
            .await;
        drop(timer);

        let result = match result {
            Ok(result) => result,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = &result {
            err_count.inc();
            crate::telemetry::trace_error(&trace, error);
        }
        result
    }
}

/// Run a transaction body on the SQLite connection thread.
fn run_transaction(
    context: &Context,
    connection: &mut rusqlite::Connection,
    body: TransactionBody,
) -> Result<Box<dyn Any + Send>> {
    if context.deadline_exceeded() {
        crate::telemetry::observe_abort("deadline");
        anyhow::bail!(TransactionDeadlineExceeded);
    }

    // Dropping the SQLite transaction without committing it rolls back all changes.
    // Immediate transactions wait out other writers on the busy timeout instead of
    // failing to upgrade their read lock.
    let sql_tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut backend = SQLiteTransaction { tx: &sql_tx };
    let mut transaction = Transaction::new(context, &mut backend);
    let value = match body(&mut transaction) {
        Ok(value) => value,
        Err(error) => {
            crate::telemetry::observe_abort("error");
            return Err(error);
        }
    };
    if context.deadline_exceeded() {
        slog::debug!(
            context.logger,
            "Rolling back SQLite transaction after the deadline elapsed"
        );
        crate::telemetry::observe_abort("deadline");
        anyhow::bail!(TransactionDeadlineExceeded);
    }
    sql_tx.commit()?;
    Ok(value)
}

/// Implementation of store operations within an open SQLite transaction.
struct SQLiteTransaction<'a> {
    tx: &'a rusqlite::Transaction<'a>,
}

impl<'a> TransactionBackend for SQLiteTransaction<'a> {
    fn delete(&mut self, op: DeleteOps) -> Result<DeleteResponses> {
        let (err_count, _timer) = crate::telemetry::observe_op(delete_op_name(&op));
        let result = match op {
            DeleteOps::Group(group) => self::groups::delete(self.tx, group),
        };
        if result.is_err() {
            err_count.inc();
        }
        result.map(|_| DeleteResponses::Success)
    }

    fn persist(&mut self, op: PersistOps) -> Result<PersistResponses> {
        let (err_count, _timer) = crate::telemetry::observe_op(persist_op_name(&op));
        let result = match op {
            PersistOps::BindGroupPermissions(bind) => {
                self::permissions::bind(self.tx, bind).map(|_| PersistResponses::Success)
            }
            PersistOps::Entity(url) => {
                self::entities::register(self.tx, url).map(PersistResponses::Created)
            }
            PersistOps::Group(group) => {
                self::groups::insert(self.tx, group).map(PersistResponses::Created)
            }
            PersistOps::GroupDescription(update) => {
                self::groups::update_description(self.tx, update)
                    .map(|_| PersistResponses::Success)
            }
            PersistOps::Identity(identity) => {
                self::members::insert_identity(self.tx, identity).map(PersistResponses::Created)
            }
            PersistOps::IdentityProviderGroup(idp_group) => {
                self::members::insert_idp_group(self.tx, idp_group).map(PersistResponses::Created)
            }
            PersistOps::Permission(key) => {
                self::permissions::insert(self.tx, key).map(PersistResponses::Created)
            }
            PersistOps::RenameGroup(rename) => {
                self::groups::rename(self.tx, rename).map(|_| PersistResponses::Success)
            }
        };
        if result.is_err() {
            err_count.inc();
        }
        result
    }

    fn query(&mut self, op: QueryOps) -> Result<QueryResponses> {
        let (err_count, _timer) = crate::telemetry::observe_op(query_op_name(&op));
        let result = match op {
            QueryOps::EntityUrls(refs) => {
                self::entities::lookup_urls(self.tx, refs).map(QueryResponses::EntityUrls)
            }
            QueryOps::Group(name) => self::groups::lookup(self.tx, &name).map(QueryResponses::Group),
            QueryOps::GroupIdentities(filter) => {
                self::members::identities(self.tx, filter).map(QueryResponses::Identities)
            }
            QueryOps::GroupIdentityProviderGroups(filter) => {
                self::members::idp_groups(self.tx, filter)
                    .map(QueryResponses::IdentityProviderGroups)
            }
            QueryOps::GroupPermissions(filter) => {
                self::permissions::by_group(self.tx, filter)
                    .map(QueryResponses::PermissionsByGroup)
            }
            QueryOps::ListGroups => self::groups::list(self.tx).map(QueryResponses::Groups),
            QueryOps::ListPermissions => {
                self::permissions::list(self.tx).map(QueryResponses::Permissions)
            }
            QueryOps::Permission(key) => {
                self::permissions::lookup(self.tx, key).map(QueryResponses::Permission)
            }
            QueryOps::ResolveEntities(urls) => {
                self::entities::resolve(self.tx, urls).map(QueryResponses::ResolvedEntities)
            }
        };
        if result.is_err() {
            err_count.inc();
        }
        result
    }
}

/// Check if an SQLite error was caused by a `UNIQUE` constraint violation.
fn is_unique_violation(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation
        }
        _ => false,
    }
}

fn delete_op_name(op: &DeleteOps) -> &'static str {
    match op {
        DeleteOps::Group(_) => "group.delete",
    }
}

fn persist_op_name(op: &PersistOps) -> &'static str {
    match op {
        PersistOps::BindGroupPermissions(_) => "group.bind_permissions",
        PersistOps::Entity(_) => "entity.register",
        PersistOps::Group(_) => "group.insert",
        PersistOps::GroupDescription(_) => "group.update_description",
        PersistOps::Identity(_) => "identity.insert",
        PersistOps::IdentityProviderGroup(_) => "idp_group.insert",
        PersistOps::Permission(_) => "permission.insert",
        PersistOps::RenameGroup(_) => "group.rename",
    }
}

fn query_op_name(op: &QueryOps) -> &'static str {
    match op {
        QueryOps::EntityUrls(_) => "entity.lookup_urls",
        QueryOps::Group(_) => "group.lookup",
        QueryOps::GroupIdentities(_) => "group.identities",
        QueryOps::GroupIdentityProviderGroups(_) => "group.idp_groups",
        QueryOps::GroupPermissions(_) => "group.permissions",
        QueryOps::ListGroups => "group.list",
        QueryOps::ListPermissions => "permission.list",
        QueryOps::Permission(_) => "permission.lookup",
        QueryOps::ResolveEntities(_) => "entity.resolve",
    }
}
