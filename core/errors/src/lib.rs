//! Common errors from and for authcore implementation.
//!
//! Errors are grouped into a small taxonomy so callers (and transport layers) can decide
//! how to report them without knowing every concrete error type:
//!
//! - Input errors: the request itself is not valid and must not be retried as is.
//! - Conflict errors: the request clashed with the current state; re-read and retry.
//! - Not found errors: the requested group does not exist.
//! - Storage errors: the backing store failed; the transaction was rolled back.
//! - Cluster notify errors: data was committed but some peers did not invalidate their caches.
//!
//! Use [`ErrorKind::classify`] to determine the kind of any [`anyhow::Error`].

/// Cluster peers failed to acknowledge an identity cache refresh.
///
/// The data mutation that triggered the refresh has already been committed.
#[derive(Debug, thiserror::Error)]
#[error("identity cache refresh failed on {} cluster peer(s): {}", .failures.len(), describe_failures(.failures))]
pub struct ClusterNotifyFailed {
    pub failures: Vec<PeerFailure>,
}

/// Details of a cluster peer that failed to refresh its cache.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerFailure {
    /// Address of the peer that failed.
    pub address: String,

    /// Description of the failure.
    pub reason: String,
}

/// Entity references in the request could not be resolved to existing entities.
#[derive(Debug, thiserror::Error)]
#[error("entity references could not be resolved: {}", .references.join(", "))]
pub struct EntityReferencesNotFound {
    pub references: Vec<String>,
}

impl EntityReferencesNotFound {
    /// Entity references in the request could not be resolved to existing entities.
    pub fn new<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut references: Vec<String> = references.into_iter().map(Into::into).collect();
        references.sort();
        Self { references }
    }
}

/// An authorisation group with the same name already exists.
#[derive(Debug, thiserror::Error)]
#[error("an authorization group named '{name}' already exists")]
pub struct GroupAlreadyExists {
    pub name: String,
}

impl GroupAlreadyExists {
    /// An authorisation group with the same name already exists.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

/// The expected authorisation group was not found.
#[derive(Debug, thiserror::Error)]
#[error("the authorization group '{name}' was not found")]
pub struct GroupNotFound {
    pub name: String,
}

impl GroupNotFound {
    /// The expected authorisation group was not found.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

/// The authorisation group changed since the version the request was based on.
#[derive(Debug, thiserror::Error)]
#[error("the authorization group '{name}' was modified since it was last read")]
pub struct GroupVersionMismatch {
    pub name: String,
}

impl GroupVersionMismatch {
    /// The authorisation group changed since the version the request was based on.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

/// The authorisation group name is not valid.
#[derive(Debug, thiserror::Error)]
#[error("invalid authorization group name '{name}': {reason}")]
pub struct InvalidGroupName {
    pub name: String,
    pub reason: String,
}

impl InvalidGroupName {
    /// The authorisation group name is not valid.
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, reason: S2) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A requested permission is not valid.
#[derive(Debug, thiserror::Error)]
#[error(
    "invalid permission with entity reference '{entity_reference}' and entitlement '{entitlement}': {reason}"
)]
pub struct InvalidPermission {
    pub entitlement: String,
    pub entity_reference: String,
    pub reason: String,
}

/// The transaction could not commit before the request deadline elapsed.
#[derive(Debug, thiserror::Error)]
#[error("the transaction could not commit before the request deadline elapsed")]
pub struct TransactionDeadlineExceeded;

/// Classification of errors returned by authcore operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The request clashed with the current state of the system.
    Conflict,

    /// Cluster peers failed to refresh their cache after a committed change.
    ClusterNotify,

    /// The request is not valid.
    Input,

    /// The requested resource does not exist.
    NotFound,

    /// The backing store failed to process the request.
    Storage,
}

impl ErrorKind {
    /// Determine the kind of an error by inspecting its entire chain.
    ///
    /// Errors that are not recognised are treated as [`ErrorKind::Storage`] errors.
    pub fn classify(error: &anyhow::Error) -> ErrorKind {
        for cause in error.chain() {
            if cause.is::<InvalidGroupName>()
                || cause.is::<InvalidPermission>()
                || cause.is::<EntityReferencesNotFound>()
            {
                return ErrorKind::Input;
            }
            if cause.is::<GroupAlreadyExists>() || cause.is::<GroupVersionMismatch>() {
                return ErrorKind::Conflict;
            }
            if cause.is::<GroupNotFound>() {
                return ErrorKind::NotFound;
            }
            if cause.is::<ClusterNotifyFailed>() {
                return ErrorKind::ClusterNotify;
            }
        }
        ErrorKind::Storage
    }

    /// HTTP status code equivalent to the error kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Conflict => 409,
            ErrorKind::ClusterNotify => 503,
            ErrorKind::Input => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Storage => 500,
        }
    }
}

fn describe_failures(failures: &[PeerFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.address, failure.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
