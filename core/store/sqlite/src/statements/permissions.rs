//! Persistent store operations on permissions and their group bindings.
use anyhow::Result;
use rusqlite::Connection;
use rusqlite::OptionalExtension;

use authcore_entity::Entitlement;
use authcore_entity::EntityRef;
use authcore_entity::EntityType;
use authcore_store::persist::BindGroupPermissions;
use authcore_store::persist::PermissionAlreadyExists;
use authcore_store::query::PermissionsByGroup;
use authcore_store::records::BindMode;
use authcore_store::records::GroupFilter;
use authcore_store::records::PermissionKey;
use authcore_store::records::PermissionRecord;

const BIND_SQL: &str = r#"
INSERT OR IGNORE INTO store_groups_permissions (group_id, permission_id)
VALUES (?1, ?2);
"#;

const BY_GROUP_SQL: &str = r#"
SELECT
    binding.group_id AS group_id,
    permission.id AS id,
    permission.entitlement AS entitlement,
    permission.entity_type AS entity_type,
    permission.entity_id AS entity_id
FROM store_groups_permissions AS binding
JOIN store_permissions AS permission ON permission.id = binding.permission_id
WHERE ?1 IS NULL OR binding.group_id = ?1
ORDER BY binding.group_id ASC, permission.id ASC;
"#;

const INSERT_SQL: &str = r#"
INSERT INTO store_permissions (entitlement, entity_type, entity_id)
VALUES (?1, ?2, ?3);
"#;

const LIST_SQL: &str = r#"
SELECT id, entitlement, entity_type, entity_id
FROM store_permissions
ORDER BY id ASC;
"#;

const LOOKUP_SQL: &str = r#"
SELECT id
FROM store_permissions
WHERE
    entitlement = ?1
    AND entity_type = ?2
    AND entity_id = ?3
;"#;

const UNBIND_ALL_SQL: &str = r#"
DELETE FROM store_groups_permissions
WHERE group_id = ?1;
"#;

/// Bind permissions to a group, optionally replacing all existing bindings.
pub fn bind(connection: &Connection, bind: BindGroupPermissions) -> Result<()> {
    if bind.mode == BindMode::Replace {
        connection.execute(UNBIND_ALL_SQL, [bind.group_id])?;
    }
    let mut statement = connection.prepare_cached(BIND_SQL)?;
    for permission in bind.permission_ids {
        statement.execute([bind.group_id, permission])?;
    }
    Ok(())
}

/// List permissions bound to the selected groups, keyed by group ID.
pub fn by_group(connection: &Connection, filter: GroupFilter) -> Result<PermissionsByGroup> {
    let group_id = match filter {
        GroupFilter::All => None,
        GroupFilter::Group(id) => Some(id),
    };
    let mut statement = connection.prepare_cached(BY_GROUP_SQL)?;
    let mut rows = statement.query([group_id])?;
    let mut permissions = PermissionsByGroup::new();
    while let Some(row) = rows.next()? {
        let group_id: i64 = row.get("group_id")?;
        let record = decode_permission(row)?;
        permissions
            .entry(group_id)
            .or_insert_with(Vec::new)
            .push(record);
    }
    Ok(permissions)
}

/// Insert a new permission and return its ID.
pub fn insert(connection: &Connection, key: PermissionKey) -> Result<i64> {
    let result = connection.execute(
        INSERT_SQL,
        rusqlite::params![
            key.entitlement.as_str(),
            key.entity.entity_type.as_str(),
            key.entity.entity_id,
        ],
    );
    match result {
        Ok(_) => Ok(connection.last_insert_rowid()),
        Err(error) if super::is_unique_violation(&error) => {
            anyhow::bail!(PermissionAlreadyExists(key))
        }
        Err(error) => Err(error.into()),
    }
}

/// List all permissions, sorted by ID.
pub fn list(connection: &Connection) -> Result<Vec<PermissionRecord>> {
    let mut statement = connection.prepare_cached(LIST_SQL)?;
    let mut rows = statement.query([])?;
    let mut permissions = Vec::new();
    while let Some(row) = rows.next()? {
        permissions.push(decode_permission(row)?);
    }
    Ok(permissions)
}

/// Lookup the ID of a permission by its unique key, if it exists.
pub fn lookup(connection: &Connection, key: PermissionKey) -> Result<Option<i64>> {
    let mut statement = connection.prepare_cached(LOOKUP_SQL)?;
    let id = statement
        .query_row(
            rusqlite::params![
                key.entitlement.as_str(),
                key.entity.entity_type.as_str(),
                key.entity.entity_id,
            ],
            |row| row.get("id"),
        )
        .optional()?;
    Ok(id)
}

fn decode_permission(row: &rusqlite::Row) -> Result<PermissionRecord> {
    let entitlement: String = row.get("entitlement")?;
    let entity_type: String = row.get("entity_type")?;
    let entitlement: Entitlement = entitlement.parse()?;
    let entity_type: EntityType = entity_type.parse()?;
    let key = PermissionKey::new(entitlement, EntityRef::new(entity_type, row.get("entity_id")?));
    Ok(PermissionRecord {
        id: row.get("id")?,
        key,
    })
}

#[cfg(test)]
mod tests {
    use authcore_context::Context;
    use authcore_entity::Entitlement;
    use authcore_entity::EntityRef;
    use authcore_entity::EntityType;
    use authcore_store::delete::DeleteGroup;
    use authcore_store::persist::BindGroupPermissions;
    use authcore_store::persist::NewGroup;
    use authcore_store::persist::NewPermission;
    use authcore_store::persist::PermissionAlreadyExists;
    use authcore_store::query::ListGroupPermissions;
    use authcore_store::query::ListPermissions;
    use authcore_store::query::LookupPermission;
    use authcore_store::records::BindMode;
    use authcore_store::records::GroupFilter;
    use authcore_store::records::PermissionKey;

    fn group(name: &str) -> NewGroup {
        NewGroup {
            name: name.into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_and_lookup() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let key = PermissionKey::new(Entitlement::CanView, EntityRef::new(EntityType::Instance, 7));

        let missing = store.query(&context, LookupPermission(key)).await.unwrap();
        assert!(missing.is_none());

        let id = store.persist(&context, NewPermission(key)).await.unwrap();
        let found = store.query(&context, LookupPermission(key)).await.unwrap();
        assert_eq!(found, Some(id));

        let error = store
            .persist(&context, NewPermission(key))
            .await
            .unwrap_err();
        assert!(error.is::<PermissionAlreadyExists>());
        let all = store.query(&context, ListPermissions).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, key);
    }

    #[tokio::test]
    async fn bind_append_and_replace() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let (g1, p1, p2) = store
            .transaction(&context, |tx| {
                let g1 = tx.persist(group("g1"))?;
                let server = EntityRef::new(EntityType::Server, 0);
                let p1 = tx.persist(NewPermission(PermissionKey::new(Entitlement::Admin, server)))?;
                let p2 =
                    tx.persist(NewPermission(PermissionKey::new(Entitlement::Viewer, server)))?;
                Ok((g1, p1, p2))
            })
            .await
            .unwrap();

        let bind = BindGroupPermissions {
            group_id: g1,
            mode: BindMode::Append,
            permission_ids: vec![p1, p1],
        };
        store.persist(&context, bind).await.unwrap();
        let bind = BindGroupPermissions {
            group_id: g1,
            mode: BindMode::Append,
            permission_ids: vec![p2],
        };
        store.persist(&context, bind).await.unwrap();
        let bindings = store
            .query(&context, ListGroupPermissions(GroupFilter::Group(g1)))
            .await
            .unwrap();
        let ids: Vec<_> = bindings[&g1].iter().map(|record| record.id).collect();
        assert_eq!(ids, [p1, p2]);

        let bind = BindGroupPermissions {
            group_id: g1,
            mode: BindMode::Replace,
            permission_ids: vec![p2],
        };
        store.persist(&context, bind).await.unwrap();
        let bindings = store
            .query(&context, ListGroupPermissions(GroupFilter::All))
            .await
            .unwrap();
        let ids: Vec<_> = bindings[&g1].iter().map(|record| record.id).collect();
        assert_eq!(ids, [p2]);

        // Permission records outlive their bindings.
        let all = store.query(&context, ListPermissions).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_group_keeps_shared_permissions() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let (g1, g2) = store
            .transaction(&context, |tx| {
                let g1 = tx.persist(group("g1"))?;
                let g2 = tx.persist(group("g2"))?;
                let shared = PermissionKey::new(
                    Entitlement::CanView,
                    EntityRef::new(EntityType::Instance, 1),
                );
                let on_g1 = PermissionKey::new(
                    Entitlement::CanEdit,
                    EntityRef::new(EntityType::AuthGroup, g1),
                );
                let shared = tx.persist(NewPermission(shared))?;
                let on_g1 = tx.persist(NewPermission(on_g1))?;
                for group_id in [g1, g2] {
                    tx.persist(BindGroupPermissions {
                        group_id,
                        mode: BindMode::Replace,
                        permission_ids: vec![shared, on_g1],
                    })?;
                }
                Ok((g1, g2))
            })
            .await
            .unwrap();

        store.delete(&context, DeleteGroup { id: g1 }).await.unwrap();
        let bindings = store
            .query(&context, ListGroupPermissions(GroupFilter::All))
            .await
            .unwrap();
        assert!(!bindings.contains_key(&g1));
        assert_eq!(bindings[&g2].len(), 1);
        assert_eq!(bindings[&g2][0].key.entitlement, Entitlement::CanView);
        let all = store.query(&context, ListPermissions).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
