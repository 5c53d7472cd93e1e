//! Configuration for the SQLite persistent store backend.
use serde::Deserialize;
use serde::Serialize;

/// SQLite specific configuration for the persistent store interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Path to the SQLite DB file.
    pub path: String,

    /// Time, in milliseconds, to wait for locks held by other connections to the DB.
    #[serde(default = "Conf::default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Conf {
    fn default_busy_timeout() -> u64 {
        5000
    }
}

/// The SQLite persistent store backend configuration is not valid.
#[derive(Debug, thiserror::Error)]
#[error("the SQLite persistent store backend configuration is not valid")]
pub struct ConfError;

#[cfg(test)]
mod tests {
    use super::Conf;

    #[test]
    fn decode_with_defaults() {
        let conf: Conf = serde_json::from_value(serde_json::json!({"path": ":memory:"})).unwrap();
        assert_eq!(conf.path, ":memory:");
        assert_eq!(conf.busy_timeout_ms, 5000);
    }

    #[test]
    fn decode_requires_path() {
        let result = serde_json::from_value::<Conf>(serde_json::json!({}));
        assert!(result.is_err());
    }
}
