//! Persistent store operations on authorisation groups.
use anyhow::Result;
use rusqlite::Connection;
use rusqlite::OptionalExtension;

use authcore_entity::EntityType;
use authcore_errors::GroupAlreadyExists;
use authcore_store::delete::DeleteGroup;
use authcore_store::persist::NewGroup;
use authcore_store::persist::RenameGroup;
use authcore_store::persist::UpdateGroupDescription;
use authcore_store::records::GroupRecord;

/// Statements to delete permissions granted on a group, as the group is going away.
const DELETE_TARGETING_SQL: [&str; 2] = [
    r#"
DELETE FROM store_groups_permissions
WHERE permission_id IN (
    SELECT id FROM store_permissions
    WHERE entity_type = ?1 AND entity_id = ?2
);"#,
    r#"
DELETE FROM store_permissions
WHERE entity_type = ?1 AND entity_id = ?2;
"#,
];

/// Statements to delete a group and its bindings.
const DELETE_SQL: [&str; 4] = [
    "DELETE FROM store_groups_permissions WHERE group_id = ?1;",
    "DELETE FROM store_identities_groups WHERE group_id = ?1;",
    "DELETE FROM store_idp_groups_groups WHERE group_id = ?1;",
    "DELETE FROM store_groups WHERE id = ?1;",
];

const INSERT_SQL: &str = r#"
INSERT INTO store_groups (name, description)
VALUES (?1, ?2);
"#;

const LIST_SQL: &str = r#"
SELECT id, name, description
FROM store_groups
ORDER BY name ASC;
"#;

const LOOKUP_SQL: &str = r#"
SELECT id, name, description
FROM store_groups
WHERE name = ?1;
"#;

const RENAME_SQL: &str = r#"
UPDATE store_groups
SET name = ?2
WHERE id = ?1;
"#;

const UPDATE_DESCRIPTION_SQL: &str = r#"
UPDATE store_groups
SET description = ?2
WHERE id = ?1;
"#;

/// Delete a group, ignoring missing groups.
pub fn delete(connection: &Connection, group: DeleteGroup) -> Result<()> {
    let entity_type = EntityType::AuthGroup.as_str();
    for sql in DELETE_TARGETING_SQL {
        connection.execute(sql, rusqlite::params![entity_type, group.id])?;
    }
    for sql in DELETE_SQL {
        connection.execute(sql, [group.id])?;
    }
    Ok(())
}

/// Insert a new group and return its ID.
pub fn insert(connection: &Connection, group: NewGroup) -> Result<i64> {
    let result = connection.execute(INSERT_SQL, rusqlite::params![group.name, group.description]);
    match result {
        Ok(_) => Ok(connection.last_insert_rowid()),
        Err(error) if super::is_unique_violation(&error) => {
            anyhow::bail!(GroupAlreadyExists::new(group.name))
        }
        Err(error) => Err(error.into()),
    }
}

/// List all groups, sorted by name.
pub fn list(connection: &Connection) -> Result<Vec<GroupRecord>> {
    let mut statement = connection.prepare_cached(LIST_SQL)?;
    let groups = statement
        .query_map([], decode_group)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

/// Lookup a group by name, if one exists.
pub fn lookup(connection: &Connection, name: &str) -> Result<Option<GroupRecord>> {
    let mut statement = connection.prepare_cached(LOOKUP_SQL)?;
    let group = statement.query_row([name], decode_group).optional()?;
    Ok(group)
}

/// Change the name of a group.
pub fn rename(connection: &Connection, rename: RenameGroup) -> Result<()> {
    let result = connection.execute(RENAME_SQL, rusqlite::params![rename.group_id, rename.name]);
    match result {
        Ok(_) => Ok(()),
        Err(error) if super::is_unique_violation(&error) => {
            anyhow::bail!(GroupAlreadyExists::new(rename.name))
        }
        Err(error) => Err(error.into()),
    }
}

/// Update the description of a group.
pub fn update_description(connection: &Connection, update: UpdateGroupDescription) -> Result<()> {
    connection.execute(
        UPDATE_DESCRIPTION_SQL,
        rusqlite::params![update.group_id, update.description],
    )?;
    Ok(())
}

fn decode_group(row: &rusqlite::Row) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
    })
}
