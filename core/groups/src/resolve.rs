//! Resolve entity locators into internal entity references.
use std::collections::BTreeSet;

use anyhow::Result;

use authcore_entity::EntityUrl;
use authcore_errors::EntityReferencesNotFound;
use authcore_store::query::ResolveEntityUrls;
use authcore_store::query::ResolvedEntities;
use authcore_store::Transaction;

/// Resolve a batch of entity locators with a single store query.
///
/// Duplicate locators are resolved once. Resolution fails, listing every missing
/// locator, if any of the entities does not exist.
pub fn resolve_many<I>(tx: &mut Transaction<'_>, urls: I) -> Result<ResolvedEntities>
where
    I: IntoIterator<Item = EntityUrl>,
{
    let urls: BTreeSet<EntityUrl> = urls.into_iter().collect();
    if urls.is_empty() {
        return Ok(ResolvedEntities::new());
    }

    let resolved = tx.query(ResolveEntityUrls(urls.iter().cloned().collect()))?;
    let missing: Vec<String> = urls
        .iter()
        .filter(|url| !resolved.contains_key(*url))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        anyhow::bail!(EntityReferencesNotFound::new(missing));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use authcore_context::Context;
    use authcore_entity::EntityRef;
    use authcore_entity::EntityType;
    use authcore_entity::EntityUrl;
    use authcore_errors::EntityReferencesNotFound;
    use authcore_store::persist::NewEntity;
    use authcore_store::Store;

    use super::resolve_many;

    #[tokio::test]
    async fn empty_input_resolves_nothing() {
        let context = Context::fixture();
        let store = Store::fixture();
        let resolved = store
            .transaction(&context, |tx| resolve_many(tx, Vec::new()))
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn resolve_duplicates_once() {
        let context = Context::fixture();
        let store = Store::fixture();
        let url = EntityUrl::parse("/instances/foo").unwrap();
        let id = store
            .persist(&context, NewEntity(url.clone()))
            .await
            .unwrap();
        let urls = vec![url.clone(), EntityUrl::server(), url.clone()];
        let resolved = store
            .transaction(&context, move |tx| resolve_many(tx, urls))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&url], EntityRef::new(EntityType::Instance, id));
    }

    #[tokio::test]
    async fn missing_entities_are_all_reported() {
        let context = Context::fixture();
        let store = Store::fixture();
        let urls = vec![
            EntityUrl::parse("/instances/foo").unwrap(),
            EntityUrl::server(),
            EntityUrl::parse("/storage-pools/local").unwrap(),
        ];
        let error = store
            .transaction(&context, move |tx| resolve_many(tx, urls))
            .await
            .unwrap_err();
        let error = error.downcast_ref::<EntityReferencesNotFound>().unwrap();
        assert_eq!(error.references, ["/instances/foo", "/storage-pools/local"]);
    }
}
