//! Cluster members and identity cache implementations for unit tests.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;

use authcore_context::Context;

use crate::ClusterMembers;
use crate::IdentityCache;
use crate::Peer;

/// Simulated cluster peer that records refresh instructions.
pub struct PeerFixture {
    address: String,
    delay: Mutex<Option<Duration>>,
    fail: AtomicBool,
    refreshes: AtomicUsize,
}

impl PeerFixture {
    /// Make the peer fail future refresh instructions.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of refresh instructions the peer received.
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Delay responses to refresh instructions by the given amount.
    pub fn slow(&self, delay: Duration) {
        let mut current = self.delay.lock().expect("PeerFixture::delay lock poisoned");
        *current = Some(delay);
    }
}

#[async_trait::async_trait]
impl Peer for PeerFixture {
    fn address(&self) -> &str {
        &self.address
    }

    async fn refresh_identity_cache(&self, _: &Context) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().expect("PeerFixture::delay lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("peer fixture configured to fail");
        }
        Ok(())
    }
}

/// Simulated cluster whose peers are all reachable.
#[derive(Clone)]
pub struct ClusterFixture {
    peers: Arc<Vec<Arc<PeerFixture>>>,
}

impl ClusterFixture {
    /// Create a simulated cluster with the given number of peers.
    pub fn new(peers: usize) -> ClusterFixture {
        let peers = (1..=peers)
            .map(|index| {
                Arc::new(PeerFixture {
                    address: format!("https://peer{}.cluster.test:8443", index),
                    delay: Mutex::new(None),
                    fail: AtomicBool::new(false),
                    refreshes: AtomicUsize::new(0),
                })
            })
            .collect();
        ClusterFixture {
            peers: Arc::new(peers),
        }
    }

    /// Access a peer in the simulated cluster.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn peer(&self, index: usize) -> &PeerFixture {
        &self.peers[index]
    }

    /// Number of refresh instructions received by each peer.
    pub fn refreshes(&self) -> Vec<usize> {
        self.peers.iter().map(|peer| peer.refreshes()).collect()
    }
}

#[async_trait::async_trait]
impl ClusterMembers for ClusterFixture {
    async fn reachable(&self, _: &Context) -> Result<Vec<Arc<dyn Peer>>> {
        let peers = self
            .peers
            .iter()
            .map(|peer| Arc::clone(peer) as Arc<dyn Peer>)
            .collect();
        Ok(peers)
    }
}

/// Local identity cache that counts refreshes.
#[derive(Clone, Default)]
pub struct IdentityCacheFixture {
    refreshes: Arc<AtomicUsize>,
}

impl IdentityCacheFixture {
    /// Number of times the local cache was refreshed.
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityCache for IdentityCacheFixture {
    async fn refresh(&self, _: &Context) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
