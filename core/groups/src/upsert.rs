//! Find or create the permission records for validated permissions.
use std::collections::HashMap;

use anyhow::Result;

use authcore_entity::ValidatedPermission;
use authcore_errors::EntityReferencesNotFound;
use authcore_store::persist::NewPermission;
use authcore_store::persist::PermissionAlreadyExists;
use authcore_store::query::LookupPermission;
use authcore_store::records::PermissionKey;
use authcore_store::Transaction;

use crate::resolve::resolve_many;

/// Return the ID of the permission record for each of the given permissions.
///
/// IDs are returned in the same order as the permissions they belong to.
/// Existing records are reused and missing ones are created, so the same
/// permission always maps to the same record (within and across requests).
pub fn upsert_permissions(
    tx: &mut Transaction<'_>,
    permissions: &[ValidatedPermission],
) -> Result<Vec<i64>> {
    let urls = permissions
        .iter()
        .map(|permission| permission.entity_url.clone());
    let entities = resolve_many(tx, urls)?;

    let mut known: HashMap<PermissionKey, i64> = HashMap::new();
    let mut ids = Vec::with_capacity(permissions.len());
    for permission in permissions {
        let entity = match entities.get(&permission.entity_url) {
            Some(entity) => *entity,
            None => {
                let missing = permission.entity_url.to_string();
                anyhow::bail!(EntityReferencesNotFound::new([missing]));
            }
        };
        let key = PermissionKey::new(permission.entitlement, entity);
        let id = match known.get(&key) {
            Some(id) => *id,
            None => insert_or_fetch(tx, key)?,
        };
        known.insert(key, id);
        ids.push(id);
    }
    Ok(ids)
}

/// Fetch the ID of a permission record, creating the record if needed.
///
/// A concurrent writer may create the same record between the lookup and the insert.
/// The uniqueness constraint rejects our insert in that case and the record is fetched again.
fn insert_or_fetch(tx: &mut Transaction<'_>, key: PermissionKey) -> Result<i64> {
    if let Some(id) = tx.query(LookupPermission(key))? {
        return Ok(id);
    }
    match tx.persist(NewPermission(key)) {
        Ok(id) => Ok(id),
        Err(error) if error.is::<PermissionAlreadyExists>() => {
            match tx.query(LookupPermission(key))? {
                Some(id) => Ok(id),
                None => Err(error),
            }
        }
        Err(error) => Err(error),
    }
}
