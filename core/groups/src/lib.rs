//! Management of authorisation groups.
//!
//! Groups bind a set of permissions to the identities and identity provider groups
//! that are members of them. The [`GroupService`] implements all group operations,
//! each within a single store transaction bounded by the configured deadline:
//!
//! - Permissions are validated before any change is made.
//! - Entity references are resolved to internal entity IDs in one batch per request.
//! - Permission records are shared across groups and never duplicated.
//! - Replace and patch requests can be made conditional on the group version (etag).
//! - Renames and deletes invalidate the identity cache of every node in the cluster.
mod events;
mod names;
mod service;
mod view;

pub mod resolve;
pub mod upsert;

#[cfg(test)]
mod tests;

pub use self::events::AUTH_GROUP_CREATED;
pub use self::events::AUTH_GROUP_DELETED;
pub use self::events::AUTH_GROUP_RENAMED;
pub use self::events::AUTH_GROUP_UPDATED;
pub use self::names::validate_group_name;
pub use self::service::GroupList;
pub use self::service::GroupService;
pub use self::service::ListMode;
pub use self::service::PermissionChecker;
pub use self::view::etag;
pub use self::view::EntityUrlMissing;
