//! Data object storing authcore's configuration.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Global configuration for the authcore process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Cluster peers to keep identity caches consistent with.
    #[serde(default)]
    pub cluster: ClusterConf,

    /// Authorisation groups management configuration.
    #[serde(default)]
    pub groups: GroupsConf,

    /// Persistent Store service configuration.
    pub store: BackendConf,
}

/// Unstructured configuration for runtime selected service backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendConf {
    /// ID of the backend selected to provide the service.
    pub backend: String,

    /// Backend specific configuration options.
    #[serde(default, flatten)]
    pub options: serde_json::Value,
}

/// Configuration of the cluster this node is a member of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConf {
    /// Time, in seconds, to wait for a connection to a peer to be established.
    #[serde(default = "ClusterConf::default_connect_timeout")]
    pub connect_timeout_sec: u64,

    /// Time, in seconds, to wait for a peer to acknowledge a cache refresh request.
    #[serde(default = "ClusterConf::default_notify_timeout")]
    pub notify_timeout_sec: u64,

    /// Base URLs of other cluster members (this node excluded).
    #[serde(default)]
    pub peers: Vec<String>,
}

impl ClusterConf {
    fn default_connect_timeout() -> u64 {
        1
    }

    fn default_notify_timeout() -> u64 {
        5
    }

    /// Timeout for establishing connections to peers.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    /// Timeout for each peer to acknowledge cache refresh requests.
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_sec)
    }
}

impl Default for ClusterConf {
    fn default() -> Self {
        ClusterConf {
            connect_timeout_sec: Self::default_connect_timeout(),
            notify_timeout_sec: Self::default_notify_timeout(),
            peers: Vec::new(),
        }
    }
}

/// Configuration of authorisation group operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupsConf {
    /// Time, in seconds, operations have to commit their transaction.
    #[serde(default = "GroupsConf::default_transaction_timeout")]
    pub transaction_timeout_sec: u64,
}

impl GroupsConf {
    fn default_transaction_timeout() -> u64 {
        10
    }

    /// Deadline for group operations to commit their transaction.
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_sec)
    }
}

impl Default for GroupsConf {
    fn default() -> Self {
        GroupsConf {
            transaction_timeout_sec: Self::default_transaction_timeout(),
        }
    }
}
