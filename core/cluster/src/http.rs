//! Cluster peers reached over HTTP(S).
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client as ReqwestClient;
use reqwest::StatusCode;

use authcore_conf::ClusterConf;
use authcore_context::Context;

use crate::ClusterMembers;
use crate::Peer;

/// String to set as the user agent in HTTP request.
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Path of the internal endpoint that refreshes a node's identity cache.
const REFRESH_PATH: &str = "internal/identity-cache-refresh";

/// The peer responded to the refresh instruction with an unsuccessful status.
#[derive(Debug, thiserror::Error)]
#[error("peer at '{address}' rejected the identity cache refresh with status {status}")]
pub struct PeerRefreshRejected {
    pub address: String,
    pub status: StatusCode,
}

/// Cluster peer reached over HTTP(S).
pub struct HttpPeer {
    address: String,
    client: ReqwestClient,
    refresh_url: String,
}

impl HttpPeer {
    /// Initialise a client for the peer at the given base address.
    pub fn new<S>(address: S, conf: &ClusterConf) -> Result<HttpPeer>
    where
        S: Into<String>,
    {
        let address = address.into();
        let client = ReqwestClient::builder()
            .connect_timeout(conf.connect_timeout())
            .timeout(conf.notify_timeout())
            .user_agent(CLIENT_USER_AGENT)
            .build()?;
        let refresh_url = format!("{}/{}", address.trim_end_matches('/'), REFRESH_PATH);
        Ok(HttpPeer {
            address,
            client,
            refresh_url,
        })
    }
}

#[async_trait::async_trait]
impl Peer for HttpPeer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn refresh_identity_cache(&self, context: &Context) -> Result<()> {
        slog::trace!(context.logger, "Requesting peer identity cache refresh"; "peer" => &self.address);
        let response = self.client.post(&self.refresh_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(PeerRefreshRejected {
                address: self.address.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Cluster members from a static list of peer addresses.
///
/// All configured peers are always considered reachable.
pub struct StaticMembers {
    peers: Vec<Arc<dyn Peer>>,
}

impl StaticMembers {
    /// Initialise HTTP clients for all peers in the cluster configuration.
    pub fn from_conf(conf: &ClusterConf) -> Result<StaticMembers> {
        let mut peers: Vec<Arc<dyn Peer>> = Vec::with_capacity(conf.peers.len());
        for address in &conf.peers {
            peers.push(Arc::new(HttpPeer::new(address.as_str(), conf)?));
        }
        Ok(StaticMembers { peers })
    }
}

#[async_trait::async_trait]
impl ClusterMembers for StaticMembers {
    async fn reachable(&self, _: &Context) -> Result<Vec<Arc<dyn Peer>>> {
        Ok(self.peers.clone())
    }
}

#[cfg(test)]
mod tests {
    use authcore_conf::ClusterConf;
    use authcore_context::Context;

    use super::HttpPeer;
    use super::StaticMembers;
    use crate::ClusterMembers;
    use crate::Peer;

    #[test]
    fn refresh_url_from_address() {
        let conf = ClusterConf::default();
        let peer = HttpPeer::new("https://node2:8443/", &conf).unwrap();
        assert_eq!(peer.address(), "https://node2:8443/");
        assert_eq!(
            peer.refresh_url,
            "https://node2:8443/internal/identity-cache-refresh"
        );
    }

    #[tokio::test]
    async fn static_members_are_reachable() {
        let conf = ClusterConf {
            peers: vec!["https://node2:8443".into(), "https://node3:8443".into()],
            ..ClusterConf::default()
        };
        let members = StaticMembers::from_conf(&conf).unwrap();
        let peers = members.reachable(&Context::fixture()).await.unwrap();
        let addresses: Vec<_> = peers.iter().map(|peer| peer.address()).collect();
        assert_eq!(addresses, ["https://node2:8443", "https://node3:8443"]);
    }

    #[tokio::test]
    async fn unreachable_peer_fails() {
        let conf = ClusterConf::default();
        // Port 9 (discard) on localhost is expected to refuse connections.
        let peer = HttpPeer::new("http://127.0.0.1:9", &conf).unwrap();
        let result = peer.refresh_identity_cache(&Context::fixture()).await;
        assert!(result.is_err());
    }
}
