//! Persistent storage interface for authcore state.
//!
//! ## An ergonomic interface
//!
//! The objective of the [`Store`] API is to provide a simple, typed interface
//! while preserving the ability of [`StoreBackend`]s to pick the most efficient
//! implementation they can create.
//!
//! To achieve this:
//!
//! - Operations are grouped into a small set of methods (query, persist, delete)
//!   that accept different data and return different data.
//! - This is implemented with a combination of an internal (sealed) `trait` and enums.
//!
//! ## Transactions
//!
//! Every interaction with the store happens inside a transaction.
//! The [`Store::transaction`] method runs a closure with access to a [`Transaction`]:
//! all operations performed by the closure commit together or not at all.
//!
//! ```ignore
//! use authcore_store::persist::NewGroup;
//! use authcore_store::query::LookupGroup;
//!
//! let id = store
//!     .transaction(context, move |tx| {
//!         if tx.query(LookupGroup::from("ops"))?.is_some() {
//!             anyhow::bail!(GroupAlreadyExists::new("ops"));
//!         }
//!         tx.persist(NewGroup { name: "ops".into(), description: String::new() })
//!     })
//!     .await?;
//! ```
//!
//! Transactions are bounded by the [`Context`] deadline, if one is set:
//! backends check the deadline before committing and roll back with
//! [`TransactionDeadlineExceeded`](authcore_errors::TransactionDeadlineExceeded) if it elapsed.
//!
//! The [`Store::query`], [`Store::persist`] and [`Store::delete`] helpers run a single
//! operation in a transaction of its own.
//!
//! ### Backend implementations
//!
//! Backend implementations receive a wrapping `enum` type for the operation group to implement.
//! This makes adding new operations a simpler, with less files needing to change.
//!
//! The cost of this approach is that backend implementation need to deal with these type enums
//! and ensure the returned type matches what the requested operation expects.
//! If you fail to properly do this the [`Transaction`] interface will panic while converting types.
use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value as Json;

use authcore_context::Context;

pub mod delete;
pub mod persist;
pub mod query;
pub mod records;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::StoreFixture;


use self::delete::DeleteOp;
use self::delete::DeleteOps;
use self::delete::DeleteResponses;
use self::persist::PersistOp;
use self::persist::PersistOps;
use self::persist::PersistResponses;
use self::query::QueryOp;
use self::query::QueryOps;
use self::query::QueryResponses;

/// Type erased closure executed by backends within a transaction.
pub type TransactionBody =
    Box<dyn FnOnce(&mut Transaction<'_>) -> Result<Box<dyn Any + Send>> + Send>;

/// Query, persist and manipulate authcore state with a database.
#[derive(Clone)]
pub struct Store {
    /// Runtime configured implementation of the persistent store.
    inner: Arc<dyn StoreBackend>,
}

impl Store {
    /// Delete individual records from the persistent store, in a transaction of their own.
    pub async fn delete<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: DeleteOp,
    {
        let op: DeleteOps = op.into();
        let response = self
            .transaction(context, move |tx| tx.inner.delete(op))
            .await?;
        Ok(O::Response::from(response))
    }

    /// Persist records into the persistent store, in a transaction of their own.
    pub async fn persist<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: PersistOp,
    {
        let op: PersistOps = op.into();
        let response = self
            .transaction(context, move |tx| tx.inner.persist(op))
            .await?;
        Ok(O::Response::from(response))
    }

    /// Query records from the persistent store, in a transaction of their own.
    pub async fn query<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: QueryOp,
    {
        let op: QueryOps = op.into();
        let response = self
            .transaction(context, move |tx| tx.inner.query(op))
            .await?;
        Ok(O::Response::from(response))
    }

    /// Execute the given closure within a single store transaction.
    ///
    /// The transaction commits if the closure returns `Ok` and the [`Context`] deadline
    /// (if any) has not elapsed. Otherwise all changes made by the closure are rolled back.
    pub async fn transaction<F, T>(&self, context: &Context, body: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let body: TransactionBody = Box::new(move |tx: &mut Transaction<'_>| {
            let value = body(tx)?;
            Ok(Box::new(value) as Box<dyn Any + Send>)
        });
        let value = self.inner.transaction(context, body).await?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => panic!("unexpected result type returned by the store transaction"),
        }
    }
}

impl<T> From<T> for Store
where
    T: StoreBackend + 'static,
{
    fn from(value: T) -> Self {
        Store {
            inner: Arc::new(value),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Store {
    /// Initialise a new store backend fixture for unit tests.
    pub fn fixture() -> Self {
        let inner = StoreFixture::default();
        Self::from(inner)
    }
}

/// Typed access to store operations within an open transaction.
pub struct Transaction<'a> {
    context: &'a Context,
    inner: &'a mut dyn TransactionBackend,
}

impl<'a> Transaction<'a> {
    /// Wrap a backend specific transaction into the typed interface.
    pub fn new(context: &'a Context, inner: &'a mut dyn TransactionBackend) -> Self {
        Transaction { context, inner }
    }

    /// Access the [`Context`] the transaction was started for.
    pub fn context(&self) -> &Context {
        self.context
    }

    /// Delete individual records from the persistent store.
    pub fn delete<O>(&mut self, op: O) -> Result<O::Response>
    where
        O: DeleteOp,
    {
        let op: DeleteOps = op.into();
        self.inner.delete(op).map(O::Response::from)
    }

    /// Persist records into the persistent store.
    pub fn persist<O>(&mut self, op: O) -> Result<O::Response>
    where
        O: PersistOp,
    {
        let op: PersistOps = op.into();
        self.inner.persist(op).map(O::Response::from)
    }

    /// Query records from the persistent store.
    pub fn query<O>(&mut self, op: O) -> Result<O::Response>
    where
        O: QueryOp,
    {
        let op: QueryOps = op.into();
        self.inner.query(op).map(O::Response::from)
    }
}

/// Transactions implemented by Persistent Stores supported by authcore.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Run the body in a new transaction and commit it if the body succeeds.
    ///
    /// Backends must roll back the transaction if the body fails or if the
    /// [`Context`] deadline elapsed by the time the body returns.
    async fn transaction(
        &self,
        context: &Context,
        body: TransactionBody,
    ) -> Result<Box<dyn Any + Send>>;
}

/// Operations implemented by backend specific transactions.
pub trait TransactionBackend {
    /// Delete individual records from the persistent store.
    fn delete(&mut self, op: DeleteOps) -> Result<DeleteResponses>;

    /// Persist records into the persistent store.
    fn persist(&mut self, op: PersistOps) -> Result<PersistResponses>;

    /// Query records from the persistent store.
    fn query(&mut self, op: QueryOps) -> Result<QueryResponses>;
}

/// Initialisation logic for the Persistent Store and the client to access it.
#[async_trait::async_trait]
pub trait StoreFactory: Send + Sync {
    /// Validate the user provided configuration for the backend.
    fn conf_check(&self, context: &Context, conf: &Json) -> Result<()>;

    /// Register backend specific metrics.
    fn register_metrics(&self, registry: &prometheus::Registry) -> Result<()>;

    /// Instantiate a [`Store`] object to access persistent state.
    async fn store<'a>(&self, args: StoreFactoryArgs<'a>) -> Result<Store>;

    /// Synchronise (initialise or migrate) the Persistent store to handle [`Store`] operations.
    async fn sync<'a>(&self, args: StoreFactorySyncArgs<'a>) -> Result<()>;
}

/// Arguments passed to the [`StoreFactory`] client initialisation method.
pub struct StoreFactoryArgs<'a> {
    /// The configuration block for the backend to initialise.
    pub conf: &'a Json,

    /// Container for operation scoped values.
    pub context: &'a Context,
}

/// Arguments passed to the [`StoreFactory`] client synchronisation method.
pub struct StoreFactorySyncArgs<'a> {
    /// The configuration block for the backend to synchronise.
    pub conf: &'a Json,

    /// Container for operation scoped values.
    pub context: &'a Context,
}
