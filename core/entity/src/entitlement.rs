//! Named capabilities that can be granted on entities.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// The entitlement is not one of the known [`Entitlement`]s.
#[derive(Debug, thiserror::Error)]
#[error("unknown entitlement '{0}'")]
pub struct UnknownEntitlement(pub String);

/// Named capabilities that can be granted on entities.
///
/// Not all entitlements are meaningful for all entities:
/// use [`EntityType::entitlements`](crate::EntityType::entitlements) to check.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entitlement {
    Admin,
    CanAccessConsole,
    CanAccessFiles,
    CanCreateGroups,
    CanCreateIdentities,
    CanCreateInstances,
    CanCreateProjects,
    CanCreateStoragePools,
    CanDelete,
    CanEdit,
    CanExec,
    CanManageBackups,
    CanManageSnapshots,
    CanUpdateState,
    CanView,
    CanViewEvents,
    CanViewGroups,
    CanViewIdentities,
    CanViewMetrics,
    Operator,
    User,
    Viewer,
}

impl Entitlement {
    /// All known entitlements.
    pub const ALL: [Entitlement; 22] = [
        Entitlement::Admin,
        Entitlement::CanAccessConsole,
        Entitlement::CanAccessFiles,
        Entitlement::CanCreateGroups,
        Entitlement::CanCreateIdentities,
        Entitlement::CanCreateInstances,
        Entitlement::CanCreateProjects,
        Entitlement::CanCreateStoragePools,
        Entitlement::CanDelete,
        Entitlement::CanEdit,
        Entitlement::CanExec,
        Entitlement::CanManageBackups,
        Entitlement::CanManageSnapshots,
        Entitlement::CanUpdateState,
        Entitlement::CanView,
        Entitlement::CanViewEvents,
        Entitlement::CanViewGroups,
        Entitlement::CanViewIdentities,
        Entitlement::CanViewMetrics,
        Entitlement::Operator,
        Entitlement::User,
        Entitlement::Viewer,
    ];

    /// Wire name of the entitlement.
    pub fn as_str(&self) -> &'static str {
        match self {
            Entitlement::Admin => "admin",
            Entitlement::CanAccessConsole => "can_access_console",
            Entitlement::CanAccessFiles => "can_access_files",
            Entitlement::CanCreateGroups => "can_create_groups",
            Entitlement::CanCreateIdentities => "can_create_identities",
            Entitlement::CanCreateInstances => "can_create_instances",
            Entitlement::CanCreateProjects => "can_create_projects",
            Entitlement::CanCreateStoragePools => "can_create_storage_pools",
            Entitlement::CanDelete => "can_delete",
            Entitlement::CanEdit => "can_edit",
            Entitlement::CanExec => "can_exec",
            Entitlement::CanManageBackups => "can_manage_backups",
            Entitlement::CanManageSnapshots => "can_manage_snapshots",
            Entitlement::CanUpdateState => "can_update_state",
            Entitlement::CanView => "can_view",
            Entitlement::CanViewEvents => "can_view_events",
            Entitlement::CanViewGroups => "can_view_groups",
            Entitlement::CanViewIdentities => "can_view_identities",
            Entitlement::CanViewMetrics => "can_view_metrics",
            Entitlement::Operator => "operator",
            Entitlement::User => "user",
            Entitlement::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Entitlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entitlement {
    type Err = UnknownEntitlement;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Entitlement::ALL
            .iter()
            .find(|entitlement| entitlement.as_str() == value)
            .copied()
            .ok_or_else(|| UnknownEntitlement(value.to_string()))
    }
}
