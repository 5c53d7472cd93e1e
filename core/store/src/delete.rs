//! Persistent store operations to delete records.
use self::seal::SealDeleteOp;
use crate::records::GroupRecord;

/// Internal trait to enable delete operations on the persistent store.
pub trait DeleteOp: Into<DeleteOps> + SealDeleteOp {
    /// Type returned by the matching delete operation.
    type Response: From<DeleteResponses>;
}

/// List of all delete operations the persistent store must implement.
pub enum DeleteOps {
    /// Delete an authorisation group by ID.
    Group(DeleteGroup),
}

/// List of all responses from delete operations.
pub enum DeleteResponses {
    /// The operation completed successfully and does not return data.
    Success,
}

// --- High level delete operations --- //
/// Request deletion of an authorisation group.
///
/// Deleting a group also removes:
///
/// - Bindings of the group to permissions, identities and identity provider groups.
/// - Permissions granted on the group itself, as the entity they refer to no longer exists.
///
/// Permission records granted on other entities are kept even if no group binds them anymore.
/// Deleting a missing group is not an error.
#[derive(Clone, Copy, Debug)]
pub struct DeleteGroup {
    /// Internal ID of the group to delete.
    pub id: i64,
}
impl From<&GroupRecord> for DeleteGroup {
    fn from(value: &GroupRecord) -> Self {
        DeleteGroup { id: value.id }
    }
}

// --- Create internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`DeleteOp`](super::DeleteOp) trait.
    pub trait SealDeleteOp {}
}

// --- Implement DeleteOp and super traits on types for transparent operations --- //
impl DeleteOp for DeleteGroup {
    type Response = ();
}
impl SealDeleteOp for DeleteGroup {}
impl From<DeleteGroup> for DeleteOps {
    fn from(value: DeleteGroup) -> Self {
        DeleteOps::Group(value)
    }
}

impl DeleteOp for &GroupRecord {
    type Response = ();
}
impl SealDeleteOp for &GroupRecord {}
impl From<&GroupRecord> for DeleteOps {
    fn from(value: &GroupRecord) -> Self {
        let value = DeleteGroup::from(value);
        DeleteOps::Group(value)
    }
}

// --- Implement DeleteResponses conversions on return types for transparent operations --- //
impl From<DeleteResponses> for () {
    fn from(value: DeleteResponses) -> Self {
        match value {
            DeleteResponses::Success => (),
        }
    }
}
