//! Cluster-wide invalidation of the identity cache.
//!
//! Every node in the cluster caches which identities belong to which groups, keyed by
//! group name. Mutations that change which names identities resolve to (renames and deletes)
//! must refresh that cache on every node before they are considered complete.
//!
//! The [`CacheInvalidator`] notifies all reachable [`Peer`]s concurrently and then refreshes
//! the local [`IdentityCache`]. Peers that fail to acknowledge the refresh are reported
//! as a [`ClusterNotifyFailed`] error after the local refresh is done.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;

use authcore_conf::ClusterConf;
use authcore_context::Context;
use authcore_errors::ClusterNotifyFailed;
use authcore_errors::PeerFailure;

mod http;
mod telemetry;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(test)]
mod tests;

pub use self::http::HttpPeer;
pub use self::http::PeerRefreshRejected;
pub use self::http::StaticMembers;
pub use self::telemetry::register_metrics;

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::{ClusterFixture, IdentityCacheFixture, PeerFixture};

/// Mutations to groups that invalidate cached identity memberships.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    /// A group was deleted.
    Delete,

    /// A group was renamed.
    Rename,
}

impl MutationKind {
    /// Label for the mutation kind in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Delete => "delete",
            MutationKind::Rename => "rename",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Another node in the cluster that keeps its own identity cache.
#[async_trait::async_trait]
pub trait Peer: Send + Sync {
    /// Address of the peer, used to identify it in errors and logs.
    fn address(&self) -> &str;

    /// Instruct the peer to refresh its identity cache.
    ///
    /// The refresh instruction is idempotent and peers may receive it more than once.
    async fn refresh_identity_cache(&self, context: &Context) -> Result<()>;
}

/// Source of the cluster peers currently considered reachable.
#[async_trait::async_trait]
pub trait ClusterMembers: Send + Sync {
    /// List the peers currently considered reachable, excluding the local node.
    async fn reachable(&self, context: &Context) -> Result<Vec<Arc<dyn Peer>>>;
}

/// Identity cache of the local node.
#[async_trait::async_trait]
pub trait IdentityCache: Send + Sync {
    /// Rebuild the cache from the store.
    async fn refresh(&self, context: &Context) -> Result<()>;
}

/// Broadcast identity cache refresh instructions across the cluster.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn IdentityCache>,
    members: Arc<dyn ClusterMembers>,
    notify_timeout: Duration,
}

impl CacheInvalidator {
    /// Notify every reachable peer to refresh its identity cache, then refresh the local cache.
    ///
    /// Peers are notified concurrently and each notification is bounded by the notify timeout.
    /// The local cache is refreshed regardless of peer failures, after which any failed peer
    /// is reported with a [`ClusterNotifyFailed`] error.
    pub async fn broadcast_and_refresh(&self, context: &Context, kind: MutationKind) -> Result<()> {
        telemetry::INVALIDATION_COUNT
            .with_label_values(&[kind.as_str()])
            .inc();
        let mut failures = Vec::new();
        match self.members.reachable(context).await {
            Err(error) => {
                telemetry::INVALIDATION_PEER_ERR.inc();
                failures.push(PeerFailure {
                    address: "cluster members".into(),
                    reason: format!("{:#}", error),
                });
            }
            Ok(peers) => {
                slog::debug!(
                    context.logger, "Broadcasting identity cache refresh to cluster peers";
                    "kind" => kind.as_str(),
                    "peers" => peers.len(),
                );
                let notifications = peers.iter().map(|peer| self.notify(context, peer.as_ref()));
                failures.extend(join_all(notifications).await.into_iter().flatten());
            }
        }

        self.cache.refresh(context).await?;
        if !failures.is_empty() {
            anyhow::bail!(ClusterNotifyFailed { failures });
        }
        Ok(())
    }

    /// Create an invalidator for the statically configured cluster peers.
    pub fn from_conf<C>(conf: &ClusterConf, cache: C) -> Result<CacheInvalidator>
    where
        C: IdentityCache + 'static,
    {
        let members = StaticMembers::from_conf(conf)?;
        Ok(CacheInvalidator::new(members, cache, conf.notify_timeout()))
    }

    /// Create an invalidator from the cluster members and local identity cache.
    pub fn new<M, C>(members: M, cache: C, notify_timeout: Duration) -> CacheInvalidator
    where
        M: ClusterMembers + 'static,
        C: IdentityCache + 'static,
    {
        CacheInvalidator {
            cache: Arc::new(cache),
            members: Arc::new(members),
            notify_timeout,
        }
    }

    async fn notify(&self, context: &Context, peer: &dyn Peer) -> Option<PeerFailure> {
        let refresh = peer.refresh_identity_cache(context);
        let reason = match tokio::time::timeout(self.notify_timeout, refresh).await {
            Ok(Ok(())) => return None,
            Ok(Err(error)) => format!("{:#}", error),
            Err(_) => format!(
                "no response within {} milliseconds",
                self.notify_timeout.as_millis()
            ),
        };
        telemetry::INVALIDATION_PEER_ERR.inc();
        Some(PeerFailure {
            address: peer.address().to_string(),
            reason,
        })
    }
}
