//! Load configuration from files.
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;

use crate::Conf;

/// Errors handling authcore configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to decode configuration from file at the given path.
    #[error("unable to decode configuration from file at '{0}'")]
    // (path,)
    Decode(String),

    /// The configuration decoded correctly but its values are not acceptable.
    #[error("invalid configuration in file at '{0}': {1}")]
    // (path, reason)
    Invalid(String, String),

    /// Unable to read configuration file at the given path.
    #[error("unable to read configuration file at '{0}'")]
    // (path,)
    Open(String),

    /// Configuration file not found at the given path.
    #[error("configuration file not found at '{0}'")]
    // (path,)
    PathNotFound(String),
}

/// Load process configuration from the specified path.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Conf> {
    let path = path.as_ref();
    let display = path.display().to_string();
    if !path.exists() {
        anyhow::bail!(Error::PathNotFound(display));
    }

    let file = File::open(path).with_context(|| Error::Open(display.clone()))?;
    let conf: Conf = serde_yaml::from_reader(file).with_context(|| Error::Decode(display.clone()))?;
    if let Some(reason) = check(&conf) {
        anyhow::bail!(Error::Invalid(display, reason));
    }
    Ok(conf)
}

/// Check configuration values, returning the reason for the first invalid value found.
fn check(conf: &Conf) -> Option<String> {
    if conf.groups.transaction_timeout_sec == 0 {
        return Some("groups.transaction_timeout_sec must be greater than zero".into());
    }
    if conf.cluster.notify_timeout_sec == 0 {
        return Some("cluster.notify_timeout_sec must be greater than zero".into());
    }
    for peer in &conf.cluster.peers {
        match url::Url::parse(peer) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => (),
            _ => return Some(format!("cluster peer '{}' is not an HTTP(S) URL", peer)),
        }
    }
    None
}
