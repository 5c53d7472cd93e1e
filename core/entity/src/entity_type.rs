//! Types of entities permissions can be granted on.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Entitlement;

/// The entity type is not one of the known [`EntityType`]s.
#[derive(Debug, thiserror::Error)]
#[error("unknown entity type '{0}'")]
pub struct UnknownEntityType(pub String);

/// Types of entities permissions can be granted on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    AuthGroup,
    Certificate,
    Identity,
    IdentityProviderGroup,
    Image,
    Instance,
    Network,
    Profile,
    Project,
    Server,
    StoragePool,
    StorageVolume,
}

impl EntityType {
    /// All known entity types.
    pub const ALL: [EntityType; 12] = [
        EntityType::AuthGroup,
        EntityType::Certificate,
        EntityType::Identity,
        EntityType::IdentityProviderGroup,
        EntityType::Image,
        EntityType::Instance,
        EntityType::Network,
        EntityType::Profile,
        EntityType::Project,
        EntityType::Server,
        EntityType::StoragePool,
        EntityType::StorageVolume,
    ];

    /// Wire name of the entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::AuthGroup => "auth_group",
            EntityType::Certificate => "certificate",
            EntityType::Identity => "identity",
            EntityType::IdentityProviderGroup => "identity_provider_group",
            EntityType::Image => "image",
            EntityType::Instance => "instance",
            EntityType::Network => "network",
            EntityType::Profile => "profile",
            EntityType::Project => "project",
            EntityType::Server => "server",
            EntityType::StoragePool => "storage_pool",
            EntityType::StorageVolume => "storage_volume",
        }
    }

    /// Entitlements that can be granted on entities of this type.
    pub fn entitlements(&self) -> &'static [Entitlement] {
        use Entitlement::*;
        match self {
            EntityType::AuthGroup => &[CanDelete, CanEdit, CanView],
            EntityType::Certificate => &[CanDelete, CanEdit, CanView],
            EntityType::Identity => &[CanDelete, CanEdit, CanView],
            EntityType::IdentityProviderGroup => &[CanDelete, CanEdit, CanView],
            EntityType::Image => &[CanDelete, CanEdit, CanView],
            EntityType::Instance => &[
                CanAccessConsole,
                CanAccessFiles,
                CanDelete,
                CanEdit,
                CanExec,
                CanManageBackups,
                CanManageSnapshots,
                CanUpdateState,
                CanView,
                Operator,
                User,
            ],
            EntityType::Network => &[CanDelete, CanEdit, CanView],
            EntityType::Profile => &[CanDelete, CanEdit, CanView],
            EntityType::Project => &[
                CanCreateInstances,
                CanDelete,
                CanEdit,
                CanView,
                CanViewEvents,
                CanViewMetrics,
                Operator,
                Viewer,
            ],
            EntityType::Server => &[
                Admin,
                CanCreateGroups,
                CanCreateIdentities,
                CanCreateProjects,
                CanCreateStoragePools,
                CanEdit,
                CanViewGroups,
                CanViewIdentities,
                CanViewMetrics,
                Viewer,
            ],
            EntityType::StoragePool => &[CanDelete, CanEdit],
            EntityType::StorageVolume => &[
                CanDelete,
                CanEdit,
                CanManageBackups,
                CanManageSnapshots,
                CanView,
            ],
        }
    }

    /// Check if the entitlement can be granted on entities of this type.
    pub fn allows(&self, entitlement: Entitlement) -> bool {
        self.entitlements().contains(&entitlement)
    }

    /// Entities of this type belong to a project.
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self,
            EntityType::Image
                | EntityType::Instance
                | EntityType::Network
                | EntityType::Profile
                | EntityType::StorageVolume
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .find(|entity_type| entity_type.as_str() == value)
            .copied()
            .ok_or_else(|| UnknownEntityType(value.to_string()))
    }
}
