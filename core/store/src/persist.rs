//! Persistent store operations to persist records.
use authcore_entity::EntityUrl;

use self::seal::SealPersistOp;
use crate::records::BindMode;
use crate::records::IdentityRecord;
use crate::records::PermissionKey;

/// Internal trait to enable persist operations on the persistent store.
pub trait PersistOp: Into<PersistOps> + SealPersistOp {
    /// Type returned by the matching persist operation.
    type Response: From<PersistResponses>;
}

/// List of all persist operations the persistent store must implement.
pub enum PersistOps {
    /// Bind permissions to an authorisation group.
    BindGroupPermissions(BindGroupPermissions),

    /// Register an entity permissions can be granted on.
    Entity(EntityUrl),

    /// Create a new authorisation group.
    Group(NewGroup),

    /// Update the description of an authorisation group.
    GroupDescription(UpdateGroupDescription),

    /// Register an identity and its group memberships.
    Identity(NewIdentity),

    /// Register an identity provider group and the groups it maps onto.
    IdentityProviderGroup(NewIdentityProviderGroup),

    /// Create a new permission record.
    Permission(PermissionKey),

    /// Change the name of an authorisation group.
    RenameGroup(RenameGroup),
}

/// List of all responses from persist operations.
pub enum PersistResponses {
    /// The operation created a record with the returned ID.
    Created(i64),

    /// The operation completed successfully and does not return data.
    Success,
}

/// A permission with the same unique key already exists.
///
/// Returned when a [`NewPermission`] insert clashes with a concurrently created permission.
#[derive(Debug, thiserror::Error)]
#[error("a permission with entitlement '{}' on entity {:?} already exists", .0.entitlement, .0.entity)]
pub struct PermissionAlreadyExists(pub PermissionKey);

// --- High level persist operations --- //
/// Bind permissions to an authorisation group.
///
/// Binding a permission the group already has is not an error.
#[derive(Clone, Debug)]
pub struct BindGroupPermissions {
    pub group_id: i64,
    pub mode: BindMode,
    pub permission_ids: Vec<i64>,
}

/// Register an entity permissions can be granted on.
///
/// Authorisation groups, identities and identity provider groups are registered with
/// their own operations and are rejected here.
#[derive(Clone, Debug)]
pub struct NewEntity(pub EntityUrl);

/// Create a new authorisation group and return its ID.
///
/// Fails with [`GroupAlreadyExists`](authcore_errors::GroupAlreadyExists) if the name is taken.
#[derive(Clone, Debug)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
}

/// Register an identity and the IDs of the groups it is a member of.
#[derive(Clone, Debug)]
pub struct NewIdentity {
    pub groups: Vec<i64>,
    pub identity: IdentityRecord,
}

/// Register an identity provider group and the IDs of the groups it maps onto.
#[derive(Clone, Debug)]
pub struct NewIdentityProviderGroup {
    pub groups: Vec<i64>,
    pub name: String,
}

/// Create a new permission and return its ID.
///
/// Fails with [`PermissionAlreadyExists`] if a permission with the same key exists.
#[derive(Clone, Copy, Debug)]
pub struct NewPermission(pub PermissionKey);

/// Change the name of an authorisation group.
///
/// Fails with [`GroupAlreadyExists`](authcore_errors::GroupAlreadyExists) if the name is taken.
#[derive(Clone, Debug)]
pub struct RenameGroup {
    pub group_id: i64,
    pub name: String,
}

/// Update the description of an authorisation group.
#[derive(Clone, Debug)]
pub struct UpdateGroupDescription {
    pub description: String,
    pub group_id: i64,
}

// --- Create internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`PersistOp`](super::PersistOp) trait.
    pub trait SealPersistOp {}
}

// --- Implement PersistOp and super traits on types for transparent operations --- //
impl PersistOp for BindGroupPermissions {
    type Response = ();
}
impl SealPersistOp for BindGroupPermissions {}
impl From<BindGroupPermissions> for PersistOps {
    fn from(value: BindGroupPermissions) -> Self {
        PersistOps::BindGroupPermissions(value)
    }
}

impl PersistOp for NewEntity {
    type Response = i64;
}
impl SealPersistOp for NewEntity {}
impl From<NewEntity> for PersistOps {
    fn from(value: NewEntity) -> Self {
        PersistOps::Entity(value.0)
    }
}

impl PersistOp for NewGroup {
    type Response = i64;
}
impl SealPersistOp for NewGroup {}
impl From<NewGroup> for PersistOps {
    fn from(value: NewGroup) -> Self {
        PersistOps::Group(value)
    }
}

impl PersistOp for NewIdentity {
    type Response = i64;
}
impl SealPersistOp for NewIdentity {}
impl From<NewIdentity> for PersistOps {
    fn from(value: NewIdentity) -> Self {
        PersistOps::Identity(value)
    }
}

impl PersistOp for NewIdentityProviderGroup {
    type Response = i64;
}
impl SealPersistOp for NewIdentityProviderGroup {}
impl From<NewIdentityProviderGroup> for PersistOps {
    fn from(value: NewIdentityProviderGroup) -> Self {
        PersistOps::IdentityProviderGroup(value)
    }
}

impl PersistOp for NewPermission {
    type Response = i64;
}
impl SealPersistOp for NewPermission {}
impl From<NewPermission> for PersistOps {
    fn from(value: NewPermission) -> Self {
        PersistOps::Permission(value.0)
    }
}

impl PersistOp for RenameGroup {
    type Response = ();
}
impl SealPersistOp for RenameGroup {}
impl From<RenameGroup> for PersistOps {
    fn from(value: RenameGroup) -> Self {
        PersistOps::RenameGroup(value)
    }
}

impl PersistOp for UpdateGroupDescription {
    type Response = ();
}
impl SealPersistOp for UpdateGroupDescription {}
impl From<UpdateGroupDescription> for PersistOps {
    fn from(value: UpdateGroupDescription) -> Self {
        PersistOps::GroupDescription(value)
    }
}

// --- Implement PersistResponses conversions on return types for transparent operations --- //
impl From<PersistResponses> for () {
    fn from(value: PersistResponses) -> Self {
        match value {
            PersistResponses::Success => (),
            _ => panic!("unexpected result type for the given persist operation"),
        }
    }
}
impl From<PersistResponses> for i64 {
    fn from(value: PersistResponses) -> Self {
        match value {
            PersistResponses::Created(id) => id,
            _ => panic!("unexpected result type for the given persist operation"),
        }
    }
}
