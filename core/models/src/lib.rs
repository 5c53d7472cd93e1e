//! API objects exchanged with clients when managing authorisation groups.
//!
//! Permissions are always expressed with their entity reference (a locator string),
//! never with the internal numeric entity ID.
use serde::Deserialize;
use serde::Serialize;

/// Full representation of an authorisation group.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthGroup {
    /// Unique name of the group.
    pub name: String,

    /// Free form description of the group.
    #[serde(default)]
    pub description: String,

    /// Permissions granted to members of the group.
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Identities that are members of the group.
    #[serde(default)]
    pub identities: Vec<Identity>,

    /// Names of identity provider groups mapped onto this group.
    #[serde(default)]
    pub identity_provider_groups: Vec<String>,
}

/// Request to rename an authorisation group.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthGroupPost {
    /// New name for the group.
    pub name: String,
}

/// Editable attributes of an authorisation group.
///
/// Used to replace (PUT) and patch (PATCH) existing groups.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthGroupPut {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Request to create a new authorisation group.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthGroupsPost {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Identity as reported in the members of an authorisation group.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Identity {
    /// Method the identity authenticates with (such as `tls` or `oidc`).
    pub authentication_method: String,

    /// Type of identity (such as a client certificate or an OIDC user).
    #[serde(rename = "type")]
    pub identity_type: String,

    /// Unique identifier of the identity within its authentication method.
    pub identifier: String,

    /// Human friendly name of the identity.
    pub name: String,
}

/// Grant of an entitlement on an entity.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Permission {
    /// Type of the entity the permission applies to.
    pub entity_type: String,

    /// Locator of the entity the permission applies to.
    pub entity_reference: String,

    /// Entitlement granted on the entity.
    pub entitlement: String,
}

impl Permission {
    /// Build a permission from its string parts.
    pub fn new<S1, S2, S3>(entity_type: S1, entity_reference: S2, entitlement: S3) -> Permission
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Permission {
            entity_type: entity_type.into(),
            entity_reference: entity_reference.into(),
            entitlement: entitlement.into(),
        }
    }
}
