use std::time::Duration;

use authcore_context::Context;
use authcore_errors::ClusterNotifyFailed;

use super::CacheInvalidator;
use super::ClusterFixture;
use super::IdentityCacheFixture;
use super::MutationKind;

fn invalidator(peers: usize) -> (CacheInvalidator, ClusterFixture, IdentityCacheFixture) {
    let cluster = ClusterFixture::new(peers);
    let cache = IdentityCacheFixture::default();
    let invalidator = CacheInvalidator::new(
        cluster.clone(),
        cache.clone(),
        Duration::from_millis(100),
    );
    (invalidator, cluster, cache)
}

#[tokio::test]
async fn every_peer_refreshes_once() {
    let (invalidator, cluster, cache) = invalidator(3);
    let context = Context::fixture();
    invalidator
        .broadcast_and_refresh(&context, MutationKind::Rename)
        .await
        .unwrap();
    assert_eq!(cluster.refreshes(), [1, 1, 1]);
    assert_eq!(cache.refreshes(), 1);
}

#[tokio::test]
async fn no_peers_refreshes_local_cache() {
    let (invalidator, _, cache) = invalidator(0);
    let context = Context::fixture();
    invalidator
        .broadcast_and_refresh(&context, MutationKind::Delete)
        .await
        .unwrap();
    assert_eq!(cache.refreshes(), 1);
}

#[tokio::test]
async fn failed_peer_is_reported_after_local_refresh() {
    let (invalidator, cluster, cache) = invalidator(3);
    cluster.peer(1).fail(true);
    let context = Context::fixture();
    let error = invalidator
        .broadcast_and_refresh(&context, MutationKind::Delete)
        .await
        .unwrap_err();

    let error = error.downcast_ref::<ClusterNotifyFailed>().unwrap();
    assert_eq!(error.failures.len(), 1);
    assert_eq!(error.failures[0].address, "https://peer2.cluster.test:8443");
    assert_eq!(cluster.refreshes(), [1, 1, 1]);
    assert_eq!(cache.refreshes(), 1);
}

#[tokio::test]
async fn slow_peer_times_out() {
    let (invalidator, cluster, cache) = invalidator(2);
    cluster.peer(0).slow(Duration::from_secs(5));
    let context = Context::fixture();
    let error = invalidator
        .broadcast_and_refresh(&context, MutationKind::Rename)
        .await
        .unwrap_err();

    let error = error.downcast_ref::<ClusterNotifyFailed>().unwrap();
    assert_eq!(error.failures.len(), 1);
    assert_eq!(error.failures[0].address, "https://peer1.cluster.test:8443");
    assert!(error.failures[0].reason.contains("no response"));
    assert_eq!(cache.refreshes(), 1);
}
