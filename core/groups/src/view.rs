//! Build the API representation of groups from store records.
use std::collections::BTreeSet;

use anyhow::Result;
use sha2::Digest;
use sha2::Sha256;

use authcore_entity::EntityRef;
use authcore_entity::ValidatedPermission;
use authcore_errors::GroupNotFound;
use authcore_models::AuthGroup;
use authcore_models::Identity;
use authcore_models::Permission;
use authcore_store::query::EntityUrls;
use authcore_store::query::ListGroupIdentities;
use authcore_store::query::ListGroupIdentityProviderGroups;
use authcore_store::query::ListGroupPermissions;
use authcore_store::query::LookupEntityUrls;
use authcore_store::records::GroupFilter;
use authcore_store::records::GroupRecord;
use authcore_store::Transaction;

/// A permission refers to an entity the store has no locator for.
#[derive(Debug, thiserror::Error)]
#[error("no locator found for entity of type '{}' with ID {}", .entity.entity_type, .entity.entity_id)]
pub struct EntityUrlMissing {
    pub entity: EntityRef,
}

/// Compute the version token of a group.
///
/// The token is the hex encoded SHA-256 digest of the JSON representation of the group.
/// Group views list their members and permissions in a fixed order so equal groups
/// always produce equal tokens.
pub fn etag(group: &AuthGroup) -> Result<String> {
    let encoded = serde_json::to_vec(group)?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}

/// Build full views for the given groups.
///
/// Bindings for all selected groups are loaded with a fixed number of store queries
/// regardless of how many groups are requested.
pub fn group_views(
    tx: &mut Transaction<'_>,
    groups: &[GroupRecord],
    filter: GroupFilter,
) -> Result<Vec<AuthGroup>> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }

    let mut permissions = tx.query(ListGroupPermissions(filter))?;
    let mut identities = tx.query(ListGroupIdentities(filter))?;
    let mut idp_groups = tx.query(ListGroupIdentityProviderGroups(filter))?;
    let entities: BTreeSet<EntityRef> = permissions
        .values()
        .flatten()
        .map(|record| record.key.entity)
        .collect();
    let urls = match entities.is_empty() {
        true => EntityUrls::new(),
        false => tx.query(LookupEntityUrls(entities.into_iter().collect()))?,
    };

    let mut views = Vec::with_capacity(groups.len());
    for group in groups {
        let mut view = AuthGroup {
            name: group.name.clone(),
            description: group.description.clone(),
            ..Default::default()
        };
        for record in permissions.remove(&group.id).unwrap_or_default() {
            let entity = record.key.entity;
            let url = urls.get(&entity).ok_or(EntityUrlMissing { entity })?;
            view.permissions.push(Permission::new(
                entity.entity_type.as_str(),
                url.to_string(),
                record.key.entitlement.as_str(),
            ));
        }
        view.permissions.sort();
        view.identities = identities
            .remove(&group.id)
            .unwrap_or_default()
            .into_iter()
            .map(|identity| Identity {
                authentication_method: identity.authentication_method,
                identity_type: identity.identity_type,
                identifier: identity.identifier,
                name: identity.name,
            })
            .collect();
        view.identities.sort();
        view.identity_provider_groups = idp_groups.remove(&group.id).unwrap_or_default();
        view.identity_provider_groups.sort();
        views.push(view);
    }
    Ok(views)
}

/// Build the full view of a single group.
pub fn load_group(tx: &mut Transaction<'_>, group: &GroupRecord) -> Result<AuthGroup> {
    let filter = GroupFilter::Group(group.id);
    let mut views = group_views(tx, std::slice::from_ref(group), filter)?;
    match views.pop() {
        Some(view) => Ok(view),
        None => anyhow::bail!(GroupNotFound::new(&group.name)),
    }
}

/// Canonical API representation of a validated permission.
pub fn wire_permission(permission: &ValidatedPermission) -> Permission {
    Permission::new(
        permission.entity_type.as_str(),
        permission.entity_url.to_string(),
        permission.entitlement.as_str(),
    )
}
