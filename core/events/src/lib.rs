//! Events sink interface for authcore lifecycle notifications.
//!
//! Events are a fire-and-forget notification mechanism: they report changes that already
//! happened to interested parties but are never the source of truth for any state.
use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

pub mod emit;

/// The payload of an event could not be encoded as JSON.
#[derive(Debug, thiserror::Error)]
#[error("unable to encode the payload of event '{code}' as JSON")]
pub struct PayloadEncodeError {
    pub code: String,
}

/// Lifecycle notification about a change that was committed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the change (such as `AUTH_GROUP_CREATED`).
    pub code: String,

    /// Free form labels attached to the event, such as the name of the changed group.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// JSON details of the change.
    #[serde(default)]
    pub payload: Value,

    /// Time the event was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl Event {
    /// Create a new event with the given code and JSON encoded payload.
    pub fn new_with_payload<S, P>(code: S, payload: P) -> Result<Event>
    where
        S: Into<String>,
        P: Serialize,
    {
        let code = code.into();
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(error) => {
                return Err(anyhow::Error::from(error).context(PayloadEncodeError { code }))
            }
        };
        Ok(Event {
            code,
            metadata: BTreeMap::new(),
            payload,
            time: OffsetDateTime::now_utc(),
        })
    }

    /// Attach a metadata label to the event.
    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Event
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
