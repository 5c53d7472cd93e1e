//! Persistent store operations to query records.
use std::collections::HashMap;

use authcore_entity::EntityRef;
use authcore_entity::EntityUrl;

use self::seal::SealQueryOp;
use crate::records::GroupFilter;
use crate::records::GroupRecord;
use crate::records::IdentityRecord;
use crate::records::PermissionKey;
use crate::records::PermissionRecord;

/// Internal trait to enable query operations on the persistent store.
pub trait QueryOp: Into<QueryOps> + SealQueryOp {
    /// Type returned by the matching query operation.
    type Response: From<QueryResponses>;
}

/// List of all query operations the persistent store must implement.
pub enum QueryOps {
    /// List identities that are members of the selected groups.
    GroupIdentities(GroupFilter),

    /// List identity provider groups mapped onto the selected groups.
    GroupIdentityProviderGroups(GroupFilter),

    /// List permissions bound to the selected groups.
    GroupPermissions(GroupFilter),

    /// Query an authorisation group by name.
    Group(String),

    /// List all authorisation groups, sorted by name.
    ListGroups,

    /// List all permission records, sorted by ID.
    ListPermissions,

    /// Rehydrate internal entity references into their canonical locators.
    EntityUrls(Vec<EntityRef>),

    /// Query the ID of a permission by its unique key.
    Permission(PermissionKey),

    /// Resolve entity locators into internal entity references.
    ResolveEntities(Vec<EntityUrl>),
}

/// List of all responses from query operations.
pub enum QueryResponses {
    /// Return locators for the entity references that exist.
    EntityUrls(EntityUrls),

    /// Return an authorisation group, if one was found matching the query.
    Group(Option<GroupRecord>),

    /// Return a list of authorisation groups.
    Groups(Vec<GroupRecord>),

    /// Return identities grouped by the ID of the group they are members of.
    Identities(IdentitiesByGroup),

    /// Return identity provider group names grouped by the ID of the group they map onto.
    IdentityProviderGroups(IdentityProviderGroupsByGroup),

    /// Return a permission ID, if one was found matching the query.
    Permission(Option<i64>),

    /// Return permissions grouped by the ID of the group they are bound to.
    PermissionsByGroup(PermissionsByGroup),

    /// Return a list of permission records.
    Permissions(Vec<PermissionRecord>),

    /// Return entity references for the locators that resolved.
    ResolvedEntities(ResolvedEntities),
}

// --- Operations return types -- //
/// Canonical locators keyed by the entity reference they were looked up for.
pub type EntityUrls = HashMap<EntityRef, EntityUrl>;

/// Identities keyed by group ID.
pub type IdentitiesByGroup = HashMap<i64, Vec<IdentityRecord>>;

/// Identity provider group names keyed by group ID.
pub type IdentityProviderGroupsByGroup = HashMap<i64, Vec<String>>;

/// Permissions keyed by group ID.
pub type PermissionsByGroup = HashMap<i64, Vec<PermissionRecord>>;

/// Entity references keyed by the locator that resolved to them.
pub type ResolvedEntities = HashMap<EntityUrl, EntityRef>;

// --- High level query operations --- //
/// List identities that are members of the selected groups.
pub struct ListGroupIdentities(pub GroupFilter);

/// List names of identity provider groups mapped onto the selected groups.
pub struct ListGroupIdentityProviderGroups(pub GroupFilter);

/// List permissions bound to the selected groups.
///
/// Groups without permissions are omitted from the response.
pub struct ListGroupPermissions(pub GroupFilter);

/// List all authorisation groups, sorted by name.
pub struct ListGroups;

/// List all permission records, sorted by ID.
pub struct ListPermissions;

/// Lookup the canonical locator of internal entity references.
///
/// References to entities that do not exist are omitted from the response.
pub struct LookupEntityUrls(pub Vec<EntityRef>);

/// Lookup an authorisation group by name.
#[derive(Clone, Debug)]
pub struct LookupGroup(pub String);
impl From<&str> for LookupGroup {
    fn from(value: &str) -> Self {
        LookupGroup(value.to_string())
    }
}
impl From<String> for LookupGroup {
    fn from(value: String) -> Self {
        LookupGroup(value)
    }
}

/// Lookup the ID of a permission by its unique key.
#[derive(Clone, Copy, Debug)]
pub struct LookupPermission(pub PermissionKey);

/// Resolve entity locators into internal entity references.
///
/// Locators that do not match any existing entity are omitted from the response.
pub struct ResolveEntityUrls(pub Vec<EntityUrl>);

// --- Internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`QueryOp`](super::QueryOp) trait.
    pub trait SealQueryOp {}
}

// --- Implement QueryOp and super traits on types for transparent operations --- //
impl SealQueryOp for ListGroupIdentities {}
impl QueryOp for ListGroupIdentities {
    type Response = IdentitiesByGroup;
}
impl From<ListGroupIdentities> for QueryOps {
    fn from(value: ListGroupIdentities) -> Self {
        QueryOps::GroupIdentities(value.0)
    }
}

impl SealQueryOp for ListGroupIdentityProviderGroups {}
impl QueryOp for ListGroupIdentityProviderGroups {
    type Response = IdentityProviderGroupsByGroup;
}
impl From<ListGroupIdentityProviderGroups> for QueryOps {
    fn from(value: ListGroupIdentityProviderGroups) -> Self {
        QueryOps::GroupIdentityProviderGroups(value.0)
    }
}

impl SealQueryOp for ListGroupPermissions {}
impl QueryOp for ListGroupPermissions {
    type Response = PermissionsByGroup;
}
impl From<ListGroupPermissions> for QueryOps {
    fn from(value: ListGroupPermissions) -> Self {
        QueryOps::GroupPermissions(value.0)
    }
}

impl SealQueryOp for ListGroups {}
impl QueryOp for ListGroups {
    type Response = Vec<GroupRecord>;
}
impl From<ListGroups> for QueryOps {
    fn from(_: ListGroups) -> Self {
        QueryOps::ListGroups
    }
}

impl SealQueryOp for ListPermissions {}
impl QueryOp for ListPermissions {
    type Response = Vec<PermissionRecord>;
}
impl From<ListPermissions> for QueryOps {
    fn from(_: ListPermissions) -> Self {
        QueryOps::ListPermissions
    }
}

impl SealQueryOp for LookupEntityUrls {}
impl QueryOp for LookupEntityUrls {
    type Response = EntityUrls;
}
impl From<LookupEntityUrls> for QueryOps {
    fn from(value: LookupEntityUrls) -> Self {
        QueryOps::EntityUrls(value.0)
    }
}

impl SealQueryOp for LookupGroup {}
impl QueryOp for LookupGroup {
    type Response = Option<GroupRecord>;
}
impl From<LookupGroup> for QueryOps {
    fn from(value: LookupGroup) -> Self {
        QueryOps::Group(value.0)
    }
}

impl SealQueryOp for LookupPermission {}
impl QueryOp for LookupPermission {
    type Response = Option<i64>;
}
impl From<LookupPermission> for QueryOps {
    fn from(value: LookupPermission) -> Self {
        QueryOps::Permission(value.0)
    }
}

impl SealQueryOp for ResolveEntityUrls {}
impl QueryOp for ResolveEntityUrls {
    type Response = ResolvedEntities;
}
impl From<ResolveEntityUrls> for QueryOps {
    fn from(value: ResolveEntityUrls) -> Self {
        QueryOps::ResolveEntities(value.0)
    }
}

// --- Implement QueryResponses conversions on return types for transparent operations --- //
impl From<QueryResponses> for EntityUrls {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::EntityUrls(urls) => urls,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Option<GroupRecord> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Group(group) => group,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Vec<GroupRecord> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Groups(groups) => groups,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for IdentitiesByGroup {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Identities(identities) => identities,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for IdentityProviderGroupsByGroup {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::IdentityProviderGroups(groups) => groups,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Option<i64> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Permission(id) => id,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for PermissionsByGroup {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::PermissionsByGroup(permissions) => permissions,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for Vec<PermissionRecord> {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::Permissions(permissions) => permissions,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
impl From<QueryResponses> for ResolvedEntities {
    fn from(value: QueryResponses) -> Self {
        match value {
            QueryResponses::ResolvedEntities(entities) => entities,
            _ => panic!("unexpected result type for the given query operation"),
        }
    }
}
