//! Persistent store operations on group members: identities and identity provider groups.
use anyhow::Result;
use rusqlite::Connection;

use authcore_store::persist::NewIdentity;
use authcore_store::persist::NewIdentityProviderGroup;
use authcore_store::query::IdentitiesByGroup;
use authcore_store::query::IdentityProviderGroupsByGroup;
use authcore_store::records::GroupFilter;
use authcore_store::records::IdentityRecord;

const IDENTITIES_SQL: &str = r#"
SELECT
    membership.group_id AS group_id,
    identity.auth_method AS auth_method,
    identity.identity_type AS identity_type,
    identity.identifier AS identifier,
    identity.name AS name
FROM store_identities_groups AS membership
JOIN store_identities AS identity ON identity.id = membership.identity_id
WHERE ?1 IS NULL OR membership.group_id = ?1
ORDER BY membership.group_id ASC, identity.id ASC;
"#;

const IDP_GROUPS_SQL: &str = r#"
SELECT
    mapping.group_id AS group_id,
    idp_group.name AS name
FROM store_idp_groups_groups AS mapping
JOIN store_idp_groups AS idp_group ON idp_group.id = mapping.idp_group_id
WHERE ?1 IS NULL OR mapping.group_id = ?1
ORDER BY mapping.group_id ASC, idp_group.name ASC;
"#;

const INSERT_IDENTITY_SQL: &str = r#"
INSERT INTO store_identities (auth_method, identity_type, identifier, name)
VALUES (?1, ?2, ?3, ?4);
"#;

const INSERT_IDENTITY_GROUP_SQL: &str = r#"
INSERT OR IGNORE INTO store_identities_groups (identity_id, group_id)
VALUES (?1, ?2);
"#;

const INSERT_IDP_GROUP_SQL: &str = "INSERT INTO store_idp_groups (name) VALUES (?1);";

const INSERT_IDP_GROUP_GROUP_SQL: &str = r#"
INSERT OR IGNORE INTO store_idp_groups_groups (idp_group_id, group_id)
VALUES (?1, ?2);
"#;

/// List identities that are members of the selected groups, keyed by group ID.
pub fn identities(connection: &Connection, filter: GroupFilter) -> Result<IdentitiesByGroup> {
    let mut statement = connection.prepare_cached(IDENTITIES_SQL)?;
    let mut rows = statement.query([filter_param(filter)])?;
    let mut identities = IdentitiesByGroup::new();
    while let Some(row) = rows.next()? {
        let group_id: i64 = row.get("group_id")?;
        let identity = IdentityRecord {
            authentication_method: row.get("auth_method")?,
            identity_type: row.get("identity_type")?,
            identifier: row.get("identifier")?,
            name: row.get("name")?,
        };
        identities
            .entry(group_id)
            .or_insert_with(Vec::new)
            .push(identity);
    }
    Ok(identities)
}

/// List names of identity provider groups mapped onto the selected groups, keyed by group ID.
pub fn idp_groups(
    connection: &Connection,
    filter: GroupFilter,
) -> Result<IdentityProviderGroupsByGroup> {
    let mut statement = connection.prepare_cached(IDP_GROUPS_SQL)?;
    let mut rows = statement.query([filter_param(filter)])?;
    let mut idp_groups = IdentityProviderGroupsByGroup::new();
    while let Some(row) = rows.next()? {
        let group_id: i64 = row.get("group_id")?;
        let name: String = row.get("name")?;
        idp_groups.entry(group_id).or_insert_with(Vec::new).push(name);
    }
    Ok(idp_groups)
}

/// Insert an identity with its group memberships and return its ID.
pub fn insert_identity(connection: &Connection, identity: NewIdentity) -> Result<i64> {
    let record = identity.identity;
    connection.execute(
        INSERT_IDENTITY_SQL,
        rusqlite::params![
            record.authentication_method,
            record.identity_type,
            record.identifier,
            record.name,
        ],
    )?;
    let id = connection.last_insert_rowid();
    let mut statement = connection.prepare_cached(INSERT_IDENTITY_GROUP_SQL)?;
    for group in identity.groups {
        statement.execute([id, group])?;
    }
    Ok(id)
}

/// Insert an identity provider group with the groups it maps onto and return its ID.
pub fn insert_idp_group(connection: &Connection, idp_group: NewIdentityProviderGroup) -> Result<i64> {
    connection.execute(INSERT_IDP_GROUP_SQL, [&idp_group.name])?;
    let id = connection.last_insert_rowid();
    let mut statement = connection.prepare_cached(INSERT_IDP_GROUP_GROUP_SQL)?;
    for group in idp_group.groups {
        statement.execute([id, group])?;
    }
    Ok(id)
}

fn filter_param(filter: GroupFilter) -> Option<i64> {
    match filter {
        GroupFilter::All => None,
        GroupFilter::Group(id) => Some(id),
    }
}
