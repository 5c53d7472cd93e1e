//! Records exchanged with the persistent store.
use serde::Deserialize;
use serde::Serialize;

use authcore_entity::Entitlement;
use authcore_entity::EntityRef;

/// How new permission bindings relate to the bindings a group already has.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindMode {
    /// Add the permissions to the group, keeping existing bindings.
    Append,

    /// Remove all existing bindings before adding the permissions.
    Replace,
}

/// Select the groups to load bindings for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupFilter {
    /// Load bindings for all groups at once.
    All,

    /// Load bindings for the group with the given ID only.
    Group(i64),
}

impl GroupFilter {
    /// Check if the group with the given ID is selected by the filter.
    pub fn matches(&self, group_id: i64) -> bool {
        match self {
            GroupFilter::All => true,
            GroupFilter::Group(id) => *id == group_id,
        }
    }
}

/// Persisted authorisation group.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Internal ID of the group, stable across renames.
    pub id: i64,

    pub name: String,
    pub description: String,
}

/// Persisted identity, as needed to report group members.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub authentication_method: String,
    pub identity_type: String,
    pub identifier: String,
    pub name: String,
}

/// Unique key of a permission: the entitlement and the entity it is granted on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PermissionKey {
    pub entitlement: Entitlement,
    pub entity: EntityRef,
}

impl PermissionKey {
    pub fn new(entitlement: Entitlement, entity: EntityRef) -> PermissionKey {
        PermissionKey {
            entitlement,
            entity,
        }
    }
}

/// Persisted permission with its internal ID.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub key: PermissionKey,
}
