//! Persistent store operations to resolve entity locators and rehydrate entity references.
//!
//! Authorisation groups, identities and identity provider groups resolve against their
//! own tables while all other entities are looked up in the `store_entities` registry.
//! Lookups are batched: each table is queried at most once per operation by joining
//! against a JSON array of the requested keys.
use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use authcore_entity::EntityRef;
use authcore_entity::EntityType;
use authcore_entity::EntityUrl;
use authcore_entity::SERVER_ENTITY_ID;
use authcore_store::query::EntityUrls;
use authcore_store::query::ResolvedEntities;

const ENTITY_ID_SQL: &str = r#"
SELECT id
FROM store_entities
WHERE
    entity_type = ?1
    AND project = ?2
    AND path = ?3
;"#;

const ENTITY_IDS_SQL: &str = r#"
SELECT e.id AS id, e.entity_type AS entity_type, e.project AS project, e.path AS path
FROM store_entities AS e
JOIN json_each(?1) AS k
    ON e.entity_type = json_extract(k.value, '$[0]')
    AND e.project = json_extract(k.value, '$[1]')
    AND e.path = json_extract(k.value, '$[2]')
;"#;

const ENTITY_URLS_SQL: &str = r#"
SELECT e.id AS id, e.entity_type AS entity_type, e.project AS project, e.path AS path
FROM store_entities AS e
JOIN json_each(?1) AS k
    ON e.entity_type = json_extract(k.value, '$[0]')
    AND e.id = json_extract(k.value, '$[1]')
;"#;

const GROUP_IDS_SQL: &str = r#"
SELECT id, name
FROM store_groups
WHERE name IN (SELECT value FROM json_each(?1))
;"#;

const GROUP_NAMES_SQL: &str = r#"
SELECT id, name
FROM store_groups
WHERE id IN (SELECT value FROM json_each(?1))
;"#;

const IDENTITY_IDS_SQL: &str = r#"
SELECT i.id AS id, i.auth_method AS auth_method, i.identifier AS identifier
FROM store_identities AS i
JOIN json_each(?1) AS k
    ON i.auth_method = json_extract(k.value, '$[0]')
    AND i.identifier = json_extract(k.value, '$[1]')
;"#;

const IDENTITY_URLS_SQL: &str = r#"
SELECT id, auth_method, identifier
FROM store_identities
WHERE id IN (SELECT value FROM json_each(?1))
;"#;

const IDP_GROUP_IDS_SQL: &str = r#"
SELECT id, name
FROM store_idp_groups
WHERE name IN (SELECT value FROM json_each(?1))
;"#;

const IDP_GROUP_NAMES_SQL: &str = r#"
SELECT id, name
FROM store_idp_groups
WHERE id IN (SELECT value FROM json_each(?1))
;"#;

const REGISTER_SQL: &str = r#"
INSERT INTO store_entities (entity_type, project, path)
VALUES (?1, ?2, ?3)
ON CONFLICT (entity_type, project, path)
DO NOTHING;
"#;

/// Key of a registry entity: its type, project (empty when global) and JSON encoded arguments.
type RegistryKey = (String, String, String);

/// The entity type can't be registered in the entities registry.
#[derive(Debug, thiserror::Error)]
#[error("entities of type '{0}' can't be registered")]
pub struct UnregistrableEntity(EntityType);

/// Rehydrate entity references into their canonical locators.
pub fn lookup_urls(connection: &Connection, refs: Vec<EntityRef>) -> Result<EntityUrls> {
    let mut groups = Vec::new();
    let mut identities = Vec::new();
    let mut idp_groups = Vec::new();
    let mut registry: HashMap<(String, i64), EntityRef> = HashMap::new();
    let mut urls = EntityUrls::new();
    for entity in refs {
        let id = entity.entity_id;
        match entity.entity_type {
            EntityType::AuthGroup => groups.push(id),
            EntityType::Identity => identities.push(id),
            EntityType::IdentityProviderGroup => idp_groups.push(id),
            EntityType::Server if id == SERVER_ENTITY_ID => {
                urls.insert(entity, EntityUrl::server());
            }
            EntityType::Server => (),
            entity_type => {
                registry.insert((entity_type.as_str().to_string(), id), entity);
            }
        }
    }

    if !groups.is_empty() {
        let mut statement = connection.prepare_cached(GROUP_NAMES_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&groups)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let name: String = row.get("name")?;
            let entity = EntityRef::new(EntityType::AuthGroup, id);
            urls.insert(entity, EntityUrl::auth_group(name));
        }
    }
    if !identities.is_empty() {
        let mut statement = connection.prepare_cached(IDENTITY_URLS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&identities)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let method: String = row.get("auth_method")?;
            let identifier: String = row.get("identifier")?;
            let entity = EntityRef::new(EntityType::Identity, id);
            let url = EntityUrl::new(EntityType::Identity, None, [method, identifier])?;
            urls.insert(entity, url);
        }
    }
    if !idp_groups.is_empty() {
        let mut statement = connection.prepare_cached(IDP_GROUP_NAMES_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&idp_groups)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let name: String = row.get("name")?;
            let entity = EntityRef::new(EntityType::IdentityProviderGroup, id);
            let url = EntityUrl::new(EntityType::IdentityProviderGroup, None, [name])?;
            urls.insert(entity, url);
        }
    }
    if !registry.is_empty() {
        let keys: Vec<(&str, i64)> = registry
            .keys()
            .map(|(entity_type, id)| (entity_type.as_str(), *id))
            .collect();
        let mut statement = connection.prepare_cached(ENTITY_URLS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&keys)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let entity_type: String = row.get("entity_type")?;
            let project: String = row.get("project")?;
            let path: String = row.get("path")?;
            let entity = match registry.get(&(entity_type, id)) {
                Some(entity) => *entity,
                None => continue,
            };
            let args: Vec<String> = serde_json::from_str(&path)?;
            let project = Some(project).filter(|project| !project.is_empty());
            let url = EntityUrl::new(entity.entity_type, project.as_deref(), args)?;
            urls.insert(entity, url);
        }
    }
    Ok(urls)
}

/// Register an entity permissions can be granted on and return its ID.
///
/// Registering an entity that already exists returns the existing ID.
pub fn register(connection: &Connection, url: EntityUrl) -> Result<i64> {
    let entity_type = url.entity_type();
    match entity_type {
        EntityType::AuthGroup
        | EntityType::Identity
        | EntityType::IdentityProviderGroup
        | EntityType::Server => anyhow::bail!(UnregistrableEntity(entity_type)),
        _ => (),
    }
    let project = url.project().unwrap_or_default();
    let path = serde_json::to_string(url.args())?;
    connection.execute(
        REGISTER_SQL,
        rusqlite::params![entity_type.as_str(), project, path],
    )?;
    let id = connection.query_row(
        ENTITY_ID_SQL,
        rusqlite::params![entity_type.as_str(), project, path],
        |row| row.get("id"),
    )?;
    Ok(id)
}

/// Resolve entity locators into entity references, omitting missing entities.
pub fn resolve(connection: &Connection, urls: Vec<EntityUrl>) -> Result<ResolvedEntities> {
    let mut groups: HashMap<String, EntityUrl> = HashMap::new();
    let mut identities: HashMap<(String, String), EntityUrl> = HashMap::new();
    let mut idp_groups: HashMap<String, EntityUrl> = HashMap::new();
    let mut registry: HashMap<RegistryKey, EntityUrl> = HashMap::new();
    let mut entities = ResolvedEntities::new();
    for url in urls {
        let args = url.args();
        match url.entity_type() {
            EntityType::AuthGroup => {
                groups.insert(args[0].clone(), url);
            }
            EntityType::Identity => {
                identities.insert((args[0].clone(), args[1].clone()), url);
            }
            EntityType::IdentityProviderGroup => {
                idp_groups.insert(args[0].clone(), url);
            }
            EntityType::Server => {
                entities.insert(url, EntityRef::new(EntityType::Server, SERVER_ENTITY_ID));
            }
            entity_type => {
                let key = (
                    entity_type.as_str().to_string(),
                    url.project().unwrap_or_default().to_string(),
                    serde_json::to_string(args)?,
                );
                registry.insert(key, url);
            }
        }
    }

    if !groups.is_empty() {
        let names: Vec<&String> = groups.keys().collect();
        let mut statement = connection.prepare_cached(GROUP_IDS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&names)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let name: String = row.get("name")?;
            if let Some(url) = groups.get(&name) {
                entities.insert(url.clone(), EntityRef::new(EntityType::AuthGroup, id));
            }
        }
    }
    if !identities.is_empty() {
        let keys: Vec<&(String, String)> = identities.keys().collect();
        let mut statement = connection.prepare_cached(IDENTITY_IDS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&keys)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let key: (String, String) = (row.get("auth_method")?, row.get("identifier")?);
            if let Some(url) = identities.get(&key) {
                entities.insert(url.clone(), EntityRef::new(EntityType::Identity, id));
            }
        }
    }
    if !idp_groups.is_empty() {
        let names: Vec<&String> = idp_groups.keys().collect();
        let mut statement = connection.prepare_cached(IDP_GROUP_IDS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&names)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let name: String = row.get("name")?;
            if let Some(url) = idp_groups.get(&name) {
                let entity = EntityRef::new(EntityType::IdentityProviderGroup, id);
                entities.insert(url.clone(), entity);
            }
        }
    }
    if !registry.is_empty() {
        let keys: Vec<&RegistryKey> = registry.keys().collect();
        let mut statement = connection.prepare_cached(ENTITY_IDS_SQL)?;
        let mut rows = statement.query([serde_json::to_string(&keys)?])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get("id")?;
            let key: RegistryKey = (
                row.get("entity_type")?,
                row.get("project")?,
                row.get("path")?,
            );
            if let Some(url) = registry.get(&key) {
                entities.insert(url.clone(), EntityRef::new(url.entity_type(), id));
            }
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use authcore_context::Context;
    use authcore_entity::EntityRef;
    use authcore_entity::EntityType;
    use authcore_entity::EntityUrl;
    use authcore_store::persist::NewEntity;
    use authcore_store::persist::NewGroup;
    use authcore_store::persist::NewIdentity;
    use authcore_store::persist::NewIdentityProviderGroup;
    use authcore_store::query::LookupEntityUrls;
    use authcore_store::query::ResolveEntityUrls;
    use authcore_store::records::IdentityRecord;

    use super::UnregistrableEntity;

    #[tokio::test]
    async fn register_is_idempotent() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let url = EntityUrl::parse("/instances/web?project=shop").unwrap();
        let first = store.persist(&context, NewEntity(url.clone())).await.unwrap();
        let second = store.persist(&context, NewEntity(url)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn register_rejects_groups() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let url = EntityUrl::auth_group("g1");
        let error = store.persist(&context, NewEntity(url)).await.unwrap_err();
        assert!(error.is::<UnregistrableEntity>());
    }

    #[tokio::test]
    async fn resolve_and_lookup_round_trip() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let instance = EntityUrl::parse("/instances/web?project=shop").unwrap();
        let volume = EntityUrl::parse("/storage-pools/local/volumes/custom/data").unwrap();
        let group = EntityUrl::auth_group("g1");
        let identity = EntityUrl::parse("/auth/identities/oidc/jane%40example.com").unwrap();
        let idp_group = EntityUrl::parse("/auth/identity-provider-groups/admins").unwrap();
        store
            .transaction(&context, |tx| {
                tx.persist(NewEntity(EntityUrl::parse("/instances/web?project=shop")?))?;
                tx.persist(NewEntity(EntityUrl::parse(
                    "/storage-pools/local/volumes/custom/data",
                )?))?;
                let g1 = tx.persist(NewGroup {
                    name: "g1".into(),
                    description: String::new(),
                })?;
                tx.persist(NewIdentity {
                    groups: vec![g1],
                    identity: IdentityRecord {
                        authentication_method: "oidc".into(),
                        identity_type: "OIDC client".into(),
                        identifier: "jane@example.com".into(),
                        name: "Jane".into(),
                    },
                })?;
                tx.persist(NewIdentityProviderGroup {
                    groups: vec![g1],
                    name: "admins".into(),
                })?;
                Ok(())
            })
            .await
            .unwrap();

        let missing = EntityUrl::parse("/instances/web").unwrap();
        let urls = vec![
            instance.clone(),
            volume.clone(),
            group.clone(),
            identity.clone(),
            idp_group.clone(),
            EntityUrl::server(),
            missing.clone(),
        ];
        let resolved = store
            .query(&context, ResolveEntityUrls(urls))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 6);
        assert!(!resolved.contains_key(&missing));
        assert_eq!(
            resolved[&EntityUrl::server()],
            EntityRef::new(EntityType::Server, 0)
        );

        let refs: Vec<EntityRef> = resolved.values().copied().collect();
        let urls = store.query(&context, LookupEntityUrls(refs)).await.unwrap();
        assert_eq!(urls.len(), 6);
        for (url, entity) in &resolved {
            assert_eq!(&urls[entity], url);
        }
        assert_eq!(
            urls[&resolved[&instance]].to_string(),
            "/instances/web?project=shop"
        );
    }

    #[tokio::test]
    async fn batch_resolves_registry_entities() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let urls: Vec<EntityUrl> = (0..20)
            .map(|index| EntityUrl::parse(&format!("/instances/web-{}", index)).unwrap())
            .collect();
        let registered = urls.clone();
        store
            .transaction(&context, move |tx| {
                for url in registered.into_iter().step_by(2) {
                    tx.persist(NewEntity(url))?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let resolved = store
            .query(&context, ResolveEntityUrls(urls.clone()))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 10);
        for (index, url) in urls.iter().enumerate() {
            assert_eq!(resolved.contains_key(url), index % 2 == 0);
        }
    }

    #[tokio::test]
    async fn lookup_skips_references_with_mismatched_type() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let url = EntityUrl::parse("/projects/shop").unwrap();
        let id = store.persist(&context, NewEntity(url.clone())).await.unwrap();

        let project = EntityRef::new(EntityType::Project, id);
        let instance = EntityRef::new(EntityType::Instance, id);
        let urls = store
            .query(&context, LookupEntityUrls(vec![project, instance]))
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[&project], url);
    }
}
