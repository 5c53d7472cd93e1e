//! Inefficient in-memory implementation of [`Store`](super::Store) for unit tests.
//!
//! Transactions operate on a copy of the state which replaces the shared state on commit.
use std::any::Any;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;

use authcore_context::Context;
use authcore_entity::EntityRef;
use authcore_entity::EntityType;
use authcore_entity::EntityUrl;
use authcore_entity::SERVER_ENTITY_ID;
use authcore_errors::GroupAlreadyExists;
use authcore_errors::TransactionDeadlineExceeded;

use super::DeleteOps;
use super::DeleteResponses;
use super::PersistOps;
use super::PersistResponses;
use super::QueryOps;
use super::QueryResponses;
use super::StoreBackend;
use super::Transaction;
use super::TransactionBackend;
use super::TransactionBody;
use crate::persist::PermissionAlreadyExists;
use crate::records::BindMode;
use crate::records::GroupRecord;
use crate::records::IdentityRecord;
use crate::records::PermissionKey;
use crate::records::PermissionRecord;

/// In-memory implementation of a mock [`Store`](super::Store) for unit tests.
#[derive(Clone)]
pub struct StoreFixture {
    /// Shared in-memory state to mock the DB with.
    inner: Arc<Mutex<StoreFixtureState>>,
}

impl StoreFixture {
    /// Lock and access the shared inner store.
    fn access(&self) -> MutexGuard<'_, StoreFixtureState> {
        self.inner
            .lock()
            .expect("StoreFixture::inner state lock poisoned")
    }

    /// Number of permission records in the store.
    pub fn permissions_count(&self) -> usize {
        self.access().permissions.len()
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        let inner = StoreFixtureState::default();
        let inner = Mutex::new(inner);
        let inner = Arc::new(inner);
        StoreFixture { inner }
    }
}

#[async_trait::async_trait]
impl StoreBackend for StoreFixture {
    async fn transaction(
        &self,
        context: &Context,
        body: TransactionBody,
    ) -> Result<Box<dyn Any + Send>> {
        if context.deadline_exceeded() {
            anyhow::bail!(TransactionDeadlineExceeded);
        }
        let mut shared = self.access();
        let mut working = shared.clone();
        let mut backend = FixtureTransaction {
            state: &mut working,
        };
        let mut transaction = Transaction::new(context, &mut backend);
        let value = body(&mut transaction)?;
        if context.deadline_exceeded() {
            anyhow::bail!(TransactionDeadlineExceeded);
        }
        *shared = working;
        Ok(value)
    }
}

/// Apply operations to the working copy of the fixture state.
struct FixtureTransaction<'a> {
    state: &'a mut StoreFixtureState,
}

impl<'a> TransactionBackend for FixtureTransaction<'a> {
    fn delete(&mut self, op: DeleteOps) -> Result<DeleteResponses> {
        let state = &mut *self.state;
        match op {
            DeleteOps::Group(group) => {
                let group_ref = EntityRef::new(EntityType::AuthGroup, group.id);
                state.groups.remove(&group.id);
                state.group_permissions.retain(|(id, _)| *id != group.id);
                state.identity_groups.retain(|(_, id)| *id != group.id);
                state.idp_group_groups.retain(|(_, id)| *id != group.id);
                let targeting: BTreeSet<i64> = state
                    .permissions
                    .iter()
                    .filter(|(_, key)| key.entity == group_ref)
                    .map(|(id, _)| *id)
                    .collect();
                state.permissions.retain(|id, _| !targeting.contains(id));
                state
                    .group_permissions
                    .retain(|(_, permission)| !targeting.contains(permission));
            }
        };
        Ok(DeleteResponses::Success)
    }

    fn persist(&mut self, op: PersistOps) -> Result<PersistResponses> {
        let state = &mut *self.state;
        match op {
            PersistOps::BindGroupPermissions(bind) => {
                if bind.mode == BindMode::Replace {
                    state.group_permissions.retain(|(id, _)| *id != bind.group_id);
                }
                for permission in bind.permission_ids {
                    state.group_permissions.insert((bind.group_id, permission));
                }
                Ok(PersistResponses::Success)
            }
            PersistOps::Entity(url) => {
                match url.entity_type() {
                    EntityType::AuthGroup
                    | EntityType::Identity
                    | EntityType::IdentityProviderGroup
                    | EntityType::Server => {
                        anyhow::bail!("entities of type '{}' can't be registered", url.entity_type())
                    }
                    _ => (),
                }
                if let Some(id) = state.find_entity(&url) {
                    return Ok(PersistResponses::Created(id));
                }
                let id = state.next_id();
                state.entities.insert(id, url);
                Ok(PersistResponses::Created(id))
            }
            PersistOps::Group(group) => {
                if state.groups.values().any(|record| record.name == group.name) {
                    anyhow::bail!(GroupAlreadyExists::new(group.name));
                }
                let id = state.next_id();
                let record = GroupRecord {
                    id,
                    name: group.name,
                    description: group.description,
                };
                state.groups.insert(id, record);
                Ok(PersistResponses::Created(id))
            }
            PersistOps::GroupDescription(update) => {
                if let Some(group) = state.groups.get_mut(&update.group_id) {
                    group.description = update.description;
                }
                Ok(PersistResponses::Success)
            }
            PersistOps::Identity(identity) => {
                let id = state.next_id();
                for group in identity.groups {
                    state.identity_groups.insert((id, group));
                }
                state.identities.insert(id, identity.identity);
                Ok(PersistResponses::Created(id))
            }
            PersistOps::IdentityProviderGroup(idp_group) => {
                let id = state.next_id();
                for group in idp_group.groups {
                    state.idp_group_groups.insert((id, group));
                }
                state.idp_groups.insert(id, idp_group.name);
                Ok(PersistResponses::Created(id))
            }
            PersistOps::Permission(key) => {
                if state.permissions.values().any(|existing| *existing == key) {
                    anyhow::bail!(PermissionAlreadyExists(key));
                }
                let id = state.next_id();
                state.permissions.insert(id, key);
                Ok(PersistResponses::Created(id))
            }
            PersistOps::RenameGroup(rename) => {
                let taken = state
                    .groups
                    .values()
                    .any(|record| record.name == rename.name && record.id != rename.group_id);
                if taken {
                    anyhow::bail!(GroupAlreadyExists::new(rename.name));
                }
                if let Some(group) = state.groups.get_mut(&rename.group_id) {
                    group.name = rename.name;
                }
                Ok(PersistResponses::Success)
            }
        }
    }

    fn query(&mut self, op: QueryOps) -> Result<QueryResponses> {
        let state = &*self.state;
        let response = match op {
            QueryOps::EntityUrls(refs) => {
                let urls = refs
                    .into_iter()
                    .filter_map(|entity| state.entity_url(entity).map(|url| (entity, url)))
                    .collect();
                QueryResponses::EntityUrls(urls)
            }
            QueryOps::Group(name) => {
                let group = state
                    .groups
                    .values()
                    .find(|group| group.name == name)
                    .cloned();
                QueryResponses::Group(group)
            }
            QueryOps::GroupIdentities(filter) => {
                let mut identities = std::collections::HashMap::new();
                for (identity, group) in &state.identity_groups {
                    if !filter.matches(*group) {
                        continue;
                    }
                    if let Some(record) = state.identities.get(identity) {
                        identities
                            .entry(*group)
                            .or_insert_with(Vec::new)
                            .push(record.clone());
                    }
                }
                QueryResponses::Identities(identities)
            }
            QueryOps::GroupIdentityProviderGroups(filter) => {
                let mut idp_groups = std::collections::HashMap::new();
                for (idp_group, group) in &state.idp_group_groups {
                    if !filter.matches(*group) {
                        continue;
                    }
                    if let Some(name) = state.idp_groups.get(idp_group) {
                        idp_groups
                            .entry(*group)
                            .or_insert_with(Vec::new)
                            .push(name.clone());
                    }
                }
                QueryResponses::IdentityProviderGroups(idp_groups)
            }
            QueryOps::GroupPermissions(filter) => {
                let mut permissions = std::collections::HashMap::new();
                for (group, permission) in &state.group_permissions {
                    if !filter.matches(*group) {
                        continue;
                    }
                    if let Some(key) = state.permissions.get(permission) {
                        let record = PermissionRecord {
                            id: *permission,
                            key: *key,
                        };
                        permissions
                            .entry(*group)
                            .or_insert_with(Vec::new)
                            .push(record);
                    }
                }
                QueryResponses::PermissionsByGroup(permissions)
            }
            QueryOps::ListGroups => {
                let mut groups: Vec<GroupRecord> = state.groups.values().cloned().collect();
                groups.sort_by(|left, right| left.name.cmp(&right.name));
                QueryResponses::Groups(groups)
            }
            QueryOps::ListPermissions => {
                let permissions = state
                    .permissions
                    .iter()
                    .map(|(id, key)| PermissionRecord { id: *id, key: *key })
                    .collect();
                QueryResponses::Permissions(permissions)
            }
            QueryOps::Permission(key) => {
                let id = state
                    .permissions
                    .iter()
                    .find(|(_, existing)| **existing == key)
                    .map(|(id, _)| *id);
                QueryResponses::Permission(id)
            }
            QueryOps::ResolveEntities(urls) => {
                let entities = urls
                    .into_iter()
                    .filter_map(|url| state.resolve(&url).map(|entity| (url, entity)))
                    .collect();
                QueryResponses::ResolvedEntities(entities)
            }
        };
        Ok(response)
    }
}

/// Container for the shared state.
#[derive(Clone, Default)]
struct StoreFixtureState {
    entities: BTreeMap<i64, EntityUrl>,
    groups: BTreeMap<i64, GroupRecord>,
    group_permissions: BTreeSet<(i64, i64)>,
    identities: BTreeMap<i64, IdentityRecord>,
    identity_groups: BTreeSet<(i64, i64)>,
    idp_groups: BTreeMap<i64, String>,
    idp_group_groups: BTreeSet<(i64, i64)>,
    last_id: i64,
    permissions: BTreeMap<i64, PermissionKey>,
}

impl StoreFixtureState {
    fn entity_url(&self, entity: EntityRef) -> Option<EntityUrl> {
        match entity.entity_type {
            EntityType::AuthGroup => self
                .groups
                .get(&entity.entity_id)
                .map(|group| EntityUrl::auth_group(group.name.clone())),
            EntityType::Identity => self.identities.get(&entity.entity_id).and_then(|identity| {
                let args = [
                    identity.authentication_method.clone(),
                    identity.identifier.clone(),
                ];
                EntityUrl::new(EntityType::Identity, None, args).ok()
            }),
            EntityType::IdentityProviderGroup => {
                self.idp_groups.get(&entity.entity_id).and_then(|name| {
                    EntityUrl::new(EntityType::IdentityProviderGroup, None, [name.clone()]).ok()
                })
            }
            EntityType::Server if entity.entity_id == SERVER_ENTITY_ID => Some(EntityUrl::server()),
            EntityType::Server => None,
            entity_type => self
                .entities
                .get(&entity.entity_id)
                .filter(|url| url.entity_type() == entity_type)
                .cloned(),
        }
    }

    fn find_entity(&self, url: &EntityUrl) -> Option<i64> {
        self.entities
            .iter()
            .find(|(_, existing)| *existing == url)
            .map(|(id, _)| *id)
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn resolve(&self, url: &EntityUrl) -> Option<EntityRef> {
        let entity_type = url.entity_type();
        let id = match entity_type {
            EntityType::AuthGroup => self
                .groups
                .values()
                .find(|group| url.args() == [group.name.as_str()])
                .map(|group| group.id),
            EntityType::Identity => self
                .identities
                .iter()
                .find(|(_, identity)| {
                    url.args()
                        == [
                            identity.authentication_method.as_str(),
                            identity.identifier.as_str(),
                        ]
                })
                .map(|(id, _)| *id),
            EntityType::IdentityProviderGroup => self
                .idp_groups
                .iter()
                .find(|(_, name)| url.args() == [name.as_str()])
                .map(|(id, _)| *id),
            EntityType::Server => Some(SERVER_ENTITY_ID),
            _ => self.find_entity(url),
        };
        id.map(|id| EntityRef::new(entity_type, id))
    }
}
