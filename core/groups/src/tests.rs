use std::time::Duration;

use authcore_cluster::CacheInvalidator;
use authcore_context::Context;
use authcore_entity::EntityType;
use authcore_entity::EntityUrl;
use authcore_errors::ErrorKind;
use authcore_errors::TransactionDeadlineExceeded;
use authcore_injector::Injector;
use authcore_injector::InjectorFixture;
use authcore_models::AuthGroupPost;
use authcore_models::AuthGroupPut;
use authcore_models::AuthGroupsPost;
use authcore_models::Permission;
use authcore_store::persist::NewEntity;
use authcore_store::persist::NewIdentity;
use authcore_store::query::ListGroupPermissions;
use authcore_store::query::ListPermissions;
use authcore_store::query::LookupGroup;
use authcore_store::records::GroupFilter;
use authcore_store::records::IdentityRecord;
use authcore_store::Store;
use authcore_store::StoreFactory;
use authcore_store::StoreFactoryArgs;
use authcore_store::StoreFactorySyncArgs;
use authcore_store_sqlite::SQLiteFactory;

use super::GroupList;
use super::GroupService;
use super::ListMode;
use super::AUTH_GROUP_CREATED;
use super::AUTH_GROUP_DELETED;
use super::AUTH_GROUP_RENAMED;
use super::AUTH_GROUP_UPDATED;

/// Entities registered in the store before each test.
const ENTITIES: [&str; 4] = [
    "/instances/foo",
    "/instances/bar",
    "/storage-pools/local",
    "/projects/shop",
];

async fn fixture() -> (InjectorFixture, GroupService) {
    let fixture = Injector::fixture();
    register_entities(&fixture.injector.store).await;
    let service = GroupService::new(&fixture.injector);
    (fixture, service)
}

async fn sqlite_fixture() -> (InjectorFixture, GroupService) {
    let mut fixture = Injector::fixture();
    let conf = serde_json::json!({"path": authcore_store_sqlite::MEMORY_PATH});
    let args = StoreFactoryArgs {
        conf: &conf,
        context: &fixture.injector.context,
    };
    fixture.injector.store = SQLiteFactory.store(args).await.unwrap();
    register_entities(&fixture.injector.store).await;
    let service = GroupService::new(&fixture.injector);
    (fixture, service)
}

async fn sqlite_file_fixture(path: &str) -> (InjectorFixture, GroupService) {
    let mut fixture = Injector::fixture();
    let conf = serde_json::json!({ "path": path });
    let args = StoreFactoryArgs {
        conf: &conf,
        context: &fixture.injector.context,
    };
    fixture.injector.store = SQLiteFactory.store(args).await.unwrap();
    let service = GroupService::new(&fixture.injector);
    (fixture, service)
}

async fn register_entities(store: &Store) {
    let context = Context::fixture();
    for entity in ENTITIES {
        let url = EntityUrl::parse(entity).unwrap();
        store.persist(&context, NewEntity(url)).await.unwrap();
    }
}

fn can_view_foo() -> Permission {
    Permission::new("instance", "/instances/foo", "can_view")
}

fn create_request(name: &str, permissions: Vec<Permission>) -> AuthGroupsPost {
    AuthGroupsPost {
        name: name.into(),
        description: format!("{} description", name),
        permissions,
    }
}

async fn permission_ids(store: &Store, group: &str) -> Vec<i64> {
    let context = Context::fixture();
    let group = store
        .query(&context, LookupGroup::from(group))
        .await
        .unwrap()
        .unwrap();
    let bindings = store
        .query(&context, ListGroupPermissions(GroupFilter::Group(group.id)))
        .await
        .unwrap();
    bindings
        .get(&group.id)
        .map(|records| records.iter().map(|record| record.id).collect())
        .unwrap_or_default()
}

/// Locator of an example entity for each entity type.
fn sample_locator(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::AuthGroup => "/auth/groups/g1",
        EntityType::Certificate => "/certificates/abc123",
        EntityType::Identity => "/auth/identities/tls/abc123",
        EntityType::IdentityProviderGroup => "/auth/identity-provider-groups/admins",
        EntityType::Image => "/images/abc123",
        EntityType::Instance => "/instances/foo",
        EntityType::Network => "/networks/lxdbr0",
        EntityType::Profile => "/profiles/default",
        EntityType::Project => "/projects/shop",
        EntityType::Server => "/",
        EntityType::StoragePool => "/storage-pools/local",
        EntityType::StorageVolume => "/storage-pools/local/volumes/custom/data",
    }
}

#[tokio::test]
async fn create_then_get_round_trip() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    let permissions = vec![
        Permission::new("storage_pool", "/storage-pools/local", "can_edit"),
        can_view_foo(),
        Permission::new("server", "/1.0", "admin"),
    ];
    let url = service
        .create(context, create_request("g1", permissions))
        .await
        .unwrap();
    assert_eq!(url.to_string(), "/auth/groups/g1");

    let (group, version) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.name, "g1");
    assert_eq!(group.description, "g1 description");
    let mut expected = vec![
        Permission::new("instance", "/instances/foo", "can_view"),
        Permission::new("server", "/", "admin"),
        Permission::new("storage_pool", "/storage-pools/local", "can_edit"),
    ];
    expected.sort();
    assert_eq!(group.permissions, expected);
    assert!(group.identities.is_empty());
    assert_eq!(version, super::etag(&group).unwrap());
}

#[tokio::test]
async fn same_permission_shares_record_across_groups() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    service
        .create(context, create_request("g2", vec![can_view_foo()]))
        .await
        .unwrap();

    let store = &fixture.injector.store;
    let g1 = permission_ids(store, "g1").await;
    let g2 = permission_ids(store, "g2").await;
    assert_eq!(g1.len(), 1);
    assert_eq!(g1, g2);
    assert_eq!(fixture.store.permissions_count(), 1);
}

#[tokio::test]
async fn duplicate_permissions_in_request_bind_once() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    let permissions = vec![
        can_view_foo(),
        can_view_foo(),
        Permission::new("instance", "/instances/foo?project=default", "can_view"),
    ];
    service
        .create(context, create_request("g1", permissions))
        .await
        .unwrap();

    let ids = permission_ids(&fixture.injector.store, "g1").await;
    assert_eq!(ids.len(), 1);
    let (group, _) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.permissions, [can_view_foo()]);
}

#[tokio::test]
async fn mismatched_entity_types_are_rejected() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    for declared in EntityType::ALL {
        for actual in EntityType::ALL {
            if declared == actual {
                continue;
            }
            let entitlement = declared.entitlements()[0];
            let permission = Permission::new(
                declared.as_str(),
                sample_locator(actual),
                entitlement.as_str(),
            );
            let error = service
                .create(context, create_request("mismatch", vec![permission]))
                .await
                .unwrap_err();
            assert_eq!(
                ErrorKind::classify(&error),
                ErrorKind::Input,
                "declared {} with locator of {}",
                declared,
                actual,
            );
        }
    }
    let groups = service
        .list(context, &|_: &EntityUrl| true, ListMode::Locators)
        .await
        .unwrap();
    assert_eq!(groups, GroupList::Locators(Vec::new()));
}

#[tokio::test]
async fn illegal_entitlements_are_rejected() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    let permission = Permission::new("storage_pool", "/storage-pools/local", "can_exec");
    let error = service
        .create(context, create_request("g1", vec![permission]))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Input);
}

#[tokio::test]
async fn group_names_are_validated() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    for name in ["", "a/b", "a:b"] {
        let error = service
            .create(context, create_request(name, Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::classify(&error), ErrorKind::Input, "name {:?}", name);
    }

    service
        .create(context, create_request("valid-name", Vec::new()))
        .await
        .unwrap();
    let error = service
        .create(context, create_request("valid-name", Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Conflict);
}

#[tokio::test]
async fn unresolved_references_abort_create() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    let permissions = vec![
        can_view_foo(),
        Permission::new("instance", "/instances/missing", "can_view"),
    ];
    let error = service
        .create(context, create_request("g1", permissions))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Input);
    assert!(error.to_string().contains("/instances/missing"));

    let error = service.get(context, "g1").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
    assert_eq!(fixture.store.permissions_count(), 0);
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    let (_, v1) = service.get(context, "g1").await.unwrap();

    let update = AuthGroupPut {
        description: "first writer".into(),
        permissions: vec![can_view_foo()],
    };
    service
        .replace(context, "g1", Some(v1.clone()), update)
        .await
        .unwrap();
    let (_, v2) = service.get(context, "g1").await.unwrap();
    assert_ne!(v1, v2);

    let update = AuthGroupPut {
        description: "second writer".into(),
        permissions: Vec::new(),
    };
    let error = service
        .replace(context, "g1", Some(v1.clone()), update.clone())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Conflict);
    let error = service
        .patch(context, "g1", Some(v1), update.clone())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Conflict);

    service
        .replace(context, "g1", Some(v2), update)
        .await
        .unwrap();
    let (group, _) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.description, "second writer");
    assert!(group.permissions.is_empty());
}

#[tokio::test]
async fn replace_without_version_is_unconditional() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    let bar = Permission::new("instance", "/instances/bar", "can_edit");
    let update = AuthGroupPut {
        description: String::new(),
        permissions: vec![bar.clone()],
    };
    service.replace(context, "g1", None, update).await.unwrap();

    let (group, _) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.description, "");
    assert_eq!(group.permissions, [bar]);
    // Unbound permission records remain available for reuse.
    assert_eq!(fixture.store.permissions_count(), 2);
}

#[tokio::test]
async fn replace_missing_group() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    let error = service
        .replace(context, "missing", None, AuthGroupPut::default())
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
    assert_eq!(error.to_string(), "the authorization group 'missing' was not found");
}

#[tokio::test]
async fn patch_is_additive() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    let (_, version) = service.get(context, "g1").await.unwrap();

    let bar = Permission::new("instance", "/instances/bar", "can_edit");
    let patch = AuthGroupPut {
        description: String::new(),
        permissions: vec![can_view_foo(), bar.clone()],
    };
    service
        .patch(context, "g1", Some(version), patch)
        .await
        .unwrap();

    let (group, _) = service.get(context, "g1").await.unwrap();
    let mut expected = vec![can_view_foo(), bar];
    expected.sort();
    assert_eq!(group.permissions, expected);
    assert_eq!(group.description, "g1 description");
    assert_eq!(permission_ids(&fixture.injector.store, "g1").await.len(), 2);
}

#[tokio::test]
async fn patch_updates_description_when_set() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    let patch = AuthGroupPut {
        description: "patched".into(),
        permissions: vec![Permission::new("instance", "/instances/foo?project=default", "can_view")],
    };
    service.patch(context, "g1", None, patch).await.unwrap();

    let (group, _) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.description, "patched");
    assert_eq!(group.permissions, [can_view_foo()]);
}

#[tokio::test]
async fn patch_validates_new_permissions() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    let patch = AuthGroupPut {
        description: "not applied".into(),
        permissions: vec![Permission::new("instance", "/storage-pools/local", "can_view")],
    };
    let error = service.patch(context, "g1", None, patch).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Input);
    let (group, _) = service.get(context, "g1").await.unwrap();
    assert_eq!(group.description, "g1 description");
}

#[tokio::test]
async fn rename_refreshes_every_peer() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    assert_eq!(fixture.cluster.refreshes(), [0, 0]);

    let request = AuthGroupPost { name: "g0".into() };
    let url = service.rename(context, "g1", request).await.unwrap();
    assert_eq!(url.to_string(), "/auth/groups/g0");
    assert_eq!(fixture.cluster.refreshes(), [1, 1]);
    assert_eq!(fixture.identity_cache.refreshes(), 1);

    let (group, _) = service.get(context, "g0").await.unwrap();
    assert_eq!(group.permissions, [can_view_foo()]);
    let error = service.get(context, "g1").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
}

#[tokio::test]
async fn rename_reports_peer_failure_after_commit() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    fixture.cluster.peer(1).fail(true);

    let request = AuthGroupPost { name: "g0".into() };
    let error = service.rename(context, "g1", request).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::ClusterNotify);
    assert_eq!(fixture.cluster.refreshes(), [1, 1]);
    assert_eq!(fixture.identity_cache.refreshes(), 1);

    // The rename itself is committed.
    service.get(context, "g0").await.unwrap();
}

#[tokio::test]
async fn rename_to_same_name_is_noop() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    let request = AuthGroupPost { name: "g1".into() };
    service.rename(context, "g1", request).await.unwrap();
    assert_eq!(fixture.cluster.refreshes(), [0, 0]);
    assert_eq!(fixture.identity_cache.refreshes(), 0);
}

#[tokio::test]
async fn rename_validates_new_name() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    let request = AuthGroupPost { name: "a/b".into() };
    let error = service.rename(context, "g1", request).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Input);

    let request = AuthGroupPost { name: "g2".into() };
    let error = service.rename(context, "missing", request).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
    assert_eq!(fixture.cluster.refreshes(), [0, 0]);
}

#[tokio::test]
async fn delete_refreshes_every_peer() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("empty", Vec::new()))
        .await
        .unwrap();
    service.delete(context, "empty").await.unwrap();
    assert_eq!(fixture.cluster.refreshes(), [1, 1]);
    assert_eq!(fixture.identity_cache.refreshes(), 1);

    let error = service.delete(context, "empty").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
    assert_eq!(fixture.cluster.refreshes(), [1, 1]);
}

#[tokio::test]
async fn delete_reports_slow_peer() {
    let mut fixture = Injector::fixture();
    fixture.injector.invalidator = CacheInvalidator::new(
        fixture.cluster.clone(),
        fixture.identity_cache.clone(),
        Duration::from_millis(50),
    );
    let service = GroupService::new(&fixture.injector);
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    fixture.cluster.peer(0).slow(Duration::from_secs(5));

    let error = service.delete(context, "g1").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::ClusterNotify);
    assert_eq!(fixture.identity_cache.refreshes(), 1);
    let error = service.get(context, "g1").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::NotFound);
}

#[tokio::test]
async fn create_and_update_do_not_invalidate() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    service
        .replace(context, "g1", None, AuthGroupPut::default())
        .await
        .unwrap();
    service
        .patch(context, "g1", None, AuthGroupPut::default())
        .await
        .unwrap();
    assert_eq!(fixture.cluster.refreshes(), [0, 0]);
    assert_eq!(fixture.identity_cache.refreshes(), 0);
}

#[tokio::test]
async fn elapsed_deadline_rolls_back() {
    let mut fixture = Injector::fixture();
    register_entities(&fixture.injector.store).await;
    fixture.injector.conf.groups.transaction_timeout_sec = 0;
    let service = GroupService::new(&fixture.injector);
    let context = &fixture.injector.context;

    let error = service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap_err();
    assert!(error.is::<TransactionDeadlineExceeded>());
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Storage);
    assert_eq!(fixture.store.permissions_count(), 0);
    let group = fixture
        .injector
        .store
        .query(context, LookupGroup::from("g1"))
        .await
        .unwrap();
    assert!(group.is_none());
}

#[tokio::test]
async fn list_applies_permission_checker() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    for name in ["zeta", "alpha", "hidden"] {
        service
            .create(context, create_request(name, vec![can_view_foo()]))
            .await
            .unwrap();
    }
    let checker = |url: &EntityUrl| url.args() != ["hidden"];

    let groups = service
        .list(context, &checker, ListMode::Locators)
        .await
        .unwrap();
    let expected = vec![EntityUrl::auth_group("alpha"), EntityUrl::auth_group("zeta")];
    assert_eq!(groups, GroupList::Locators(expected));

    let groups = service.list(context, &checker, ListMode::Full).await.unwrap();
    let groups = match groups {
        GroupList::Full(groups) => groups,
        other => panic!("expected full groups, got {:?}", other),
    };
    let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(names, ["alpha", "zeta"]);
    assert!(groups.iter().all(|group| group.permissions == [can_view_foo()]));
}

#[tokio::test]
async fn list_full_includes_members() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    service
        .create(context, create_request("g2", Vec::new()))
        .await
        .unwrap();
    let group = fixture
        .injector
        .store
        .query(context, LookupGroup::from("g1"))
        .await
        .unwrap()
        .unwrap();
    let identity = NewIdentity {
        groups: vec![group.id],
        identity: IdentityRecord {
            authentication_method: "oidc".into(),
            identity_type: "OIDC client".into(),
            identifier: "jane@example.com".into(),
            name: "Jane".into(),
        },
    };
    fixture
        .injector
        .store
        .persist(context, identity)
        .await
        .unwrap();

    // Permissions on identities rehydrate to their locators.
    let patch = AuthGroupPut {
        description: String::new(),
        permissions: vec![Permission::new(
            "identity",
            "/auth/identities/oidc/jane%40example.com",
            "can_view",
        )],
    };
    service.patch(context, "g2", None, patch).await.unwrap();

    let groups = match service.list(context, &|_: &EntityUrl| true, ListMode::Full).await {
        Ok(GroupList::Full(groups)) => groups,
        other => panic!("expected full groups, got {:?}", other),
    };
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].identities.len(), 1);
    assert_eq!(groups[0].identities[0].identifier, "jane@example.com");
    assert!(groups[1].identities.is_empty());
    assert_eq!(
        groups[1].permissions[0].entity_reference,
        "/auth/identities/oidc/jane%40example.com",
    );
}

#[tokio::test]
async fn lifecycle_events_are_emitted() {
    let (mut fixture, service) = fixture().await;
    let context = fixture.injector.context.clone();
    let timeout = Duration::from_secs(1);
    service
        .create(&context, create_request("g1", Vec::new()))
        .await
        .unwrap();
    service
        .replace(&context, "g1", None, AuthGroupPut::default())
        .await
        .unwrap();
    service
        .rename(&context, "g1", AuthGroupPost { name: "g2".into() })
        .await
        .unwrap();
    service.delete(&context, "g2").await.unwrap();

    let event = fixture.events.pop_change_timeout(timeout).await.unwrap();
    assert_eq!(event.code, AUTH_GROUP_CREATED);
    let event = fixture.events.pop_change_timeout(timeout).await.unwrap();
    assert_eq!(event.code, AUTH_GROUP_UPDATED);
    let event = fixture.events.pop_change_timeout(timeout).await.unwrap();
    assert_eq!(event.code, AUTH_GROUP_RENAMED);
    assert_eq!(event.payload["old_name"], "g1");
    assert_eq!(event.payload["name"], "g2");
    let event = fixture.events.pop_change_timeout(timeout).await.unwrap();
    assert_eq!(event.code, AUTH_GROUP_DELETED);
}

async fn shared_permission_scenario(fixture: InjectorFixture, service: GroupService) {
    let context = &fixture.injector.context;
    let url = service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    assert_eq!(url.to_string(), "/auth/groups/g1");
    let url = service
        .create(context, create_request("g2", vec![can_view_foo()]))
        .await
        .unwrap();
    assert_eq!(url.to_string(), "/auth/groups/g2");
    let store = &fixture.injector.store;
    assert_eq!(
        permission_ids(store, "g1").await,
        permission_ids(store, "g2").await
    );

    let request = AuthGroupPost { name: "g2".into() };
    let error = service.rename(context, "g1", request).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Conflict);
    assert_eq!(fixture.cluster.refreshes(), [0, 0]);

    service.delete(context, "g1").await.unwrap();
    let (group, _) = service.get(context, "g2").await.unwrap();
    assert_eq!(group.permissions, [can_view_foo()]);
}

#[tokio::test]
async fn shared_permission_survives_group_delete() {
    let (fixture, service) = fixture().await;
    shared_permission_scenario(fixture, service).await;
}

#[tokio::test]
async fn shared_permission_survives_group_delete_sqlite() {
    let (fixture, service) = sqlite_fixture().await;
    shared_permission_scenario(fixture, service).await;
}

#[tokio::test]
async fn stale_version_is_rejected_sqlite() {
    let (fixture, service) = sqlite_fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("g1", vec![can_view_foo()]))
        .await
        .unwrap();
    let (_, v1) = service.get(context, "g1").await.unwrap();
    let patch = AuthGroupPut {
        description: String::new(),
        permissions: vec![Permission::new("project", "/projects/shop", "can_view")],
    };
    service
        .patch(context, "g1", Some(v1.clone()), patch.clone())
        .await
        .unwrap();
    let error = service
        .patch(context, "g1", Some(v1), patch)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&error), ErrorKind::Conflict);
}

#[tokio::test]
async fn delete_removes_permissions_on_group() {
    let (fixture, service) = fixture().await;
    let context = &fixture.injector.context;
    service
        .create(context, create_request("target", Vec::new()))
        .await
        .unwrap();
    let managers = vec![
        Permission::new("auth_group", "/auth/groups/target", "can_edit"),
        can_view_foo(),
    ];
    service
        .create(context, create_request("managers", managers))
        .await
        .unwrap();
    assert_eq!(fixture.store.permissions_count(), 2);

    service.delete(context, "target").await.unwrap();
    let (group, _) = service.get(context, "managers").await.unwrap();
    assert_eq!(group.permissions, [can_view_foo()]);
    assert_eq!(fixture.store.permissions_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_creates_share_permission_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("authcore.db");
    let path = path.to_str().unwrap();
    let context = Context::fixture();
    let conf = serde_json::json!({ "path": path });
    let args = StoreFactorySyncArgs {
        conf: &conf,
        context: &context,
    };
    SQLiteFactory.sync(args).await.unwrap();

    let (left, left_service) = sqlite_file_fixture(path).await;
    let (right, right_service) = sqlite_file_fixture(path).await;
    register_entities(&left.injector.store).await;

    let (created_left, created_right) = tokio::join!(
        left_service.create(
            &left.injector.context,
            create_request("g1", vec![can_view_foo()])
        ),
        right_service.create(
            &right.injector.context,
            create_request("g2", vec![can_view_foo()])
        ),
    );
    created_left.unwrap();
    created_right.unwrap();

    let store = &right.injector.store;
    let permissions = store.query(&context, ListPermissions).await.unwrap();
    assert_eq!(permissions.len(), 1);
    let id = permissions[0].id;
    assert_eq!(permission_ids(store, "g1").await, [id]);
    assert_eq!(permission_ids(store, "g2").await, [id]);
}
