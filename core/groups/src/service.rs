//! Operations on authorisation groups.
use std::time::Duration;

use anyhow::Result;

use authcore_cluster::CacheInvalidator;
use authcore_cluster::MutationKind;
use authcore_context::Context;
use authcore_entity::validate_permission;
use authcore_entity::EntityUrl;
use authcore_entity::ValidatedPermission;
use authcore_errors::GroupAlreadyExists;
use authcore_errors::GroupNotFound;
use authcore_errors::GroupVersionMismatch;
use authcore_errors::InvalidPermission;
use authcore_events::emit::Events;
use authcore_injector::Injector;
use authcore_models::AuthGroup;
use authcore_models::AuthGroupPost;
use authcore_models::AuthGroupPut;
use authcore_models::AuthGroupsPost;
use authcore_models::Permission;
use authcore_store::delete::DeleteGroup;
use authcore_store::persist::BindGroupPermissions;
use authcore_store::persist::NewGroup;
use authcore_store::persist::RenameGroup;
use authcore_store::persist::UpdateGroupDescription;
use authcore_store::query::ListGroups;
use authcore_store::query::LookupGroup;
use authcore_store::records::BindMode;
use authcore_store::records::GroupFilter;
use authcore_store::records::GroupRecord;
use authcore_store::Store;
use authcore_store::Transaction;

use crate::events::group_event;
use crate::events::AUTH_GROUP_CREATED;
use crate::events::AUTH_GROUP_DELETED;
use crate::events::AUTH_GROUP_RENAMED;
use crate::events::AUTH_GROUP_UPDATED;
use crate::names::validate_group_name;
use crate::upsert::upsert_permissions;
use crate::view::etag;
use crate::view::group_views;
use crate::view::load_group;
use crate::view::wire_permission;

/// Decide which groups the caller is allowed to see.
pub trait PermissionChecker {
    /// Check if the caller can view the group with the given locator.
    fn allowed(&self, group: &EntityUrl) -> bool;
}

impl<F> PermissionChecker for F
where
    F: Fn(&EntityUrl) -> bool,
{
    fn allowed(&self, group: &EntityUrl) -> bool {
        self(group)
    }
}

/// Level of detail returned when listing groups.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListMode {
    /// Return the full representation of groups.
    Full,

    /// Return only the locator of groups.
    Locators,
}

/// Groups visible to the caller, in the requested level of detail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GroupList {
    Full(Vec<AuthGroup>),
    Locators(Vec<EntityUrl>),
}

/// Create, query, update and delete authorisation groups.
#[derive(Clone)]
pub struct GroupService {
    events: Events,
    invalidator: CacheInvalidator,
    store: Store,
    transaction_timeout: Duration,
}

impl GroupService {
    /// Create a new group with the given permissions.
    pub async fn create(&self, context: &Context, request: AuthGroupsPost) -> Result<EntityUrl> {
        let context = self.op_context(context, &request.name);
        slog::debug!(context.logger, "Creating authorization group");
        validate_group_name(&request.name)?;
        let permissions = validate_permissions(&request.permissions)?;

        let group = NewGroup {
            name: request.name.clone(),
            description: request.description,
        };
        self.store
            .transaction(&context, move |tx| {
                let group_id = tx.persist(group)?;
                bind_permissions(tx, group_id, BindMode::Replace, &permissions)
            })
            .await?;

        slog::info!(context.logger, "Authorization group created");
        self.emit(&context, AUTH_GROUP_CREATED, &request.name, None)
            .await;
        Ok(EntityUrl::auth_group(request.name))
    }

    /// Delete a group and all its bindings.
    ///
    /// The identity cache of all cluster nodes is refreshed once the group is deleted.
    pub async fn delete(&self, context: &Context, name: &str) -> Result<()> {
        let context = self.op_context(context, name);
        slog::debug!(context.logger, "Deleting authorization group");
        let group_name = name.to_string();
        self.store
            .transaction(&context, move |tx| {
                let group = find_group(tx, &group_name)?;
                tx.delete(DeleteGroup::from(&group))
            })
            .await?;

        slog::info!(context.logger, "Authorization group deleted");
        let invalidated = self.invalidate(&context, MutationKind::Delete).await;
        self.emit(&context, AUTH_GROUP_DELETED, name, None).await;
        invalidated
    }

    /// Return the full representation of a group and its current version token.
    pub async fn get(&self, context: &Context, name: &str) -> Result<(AuthGroup, String)> {
        let context = self.op_context(context, name);
        slog::debug!(context.logger, "Looking up authorization group");
        let group_name = name.to_string();
        let group = self
            .store
            .transaction(&context, move |tx| {
                let group = find_group(tx, &group_name)?;
                load_group(tx, &group)
            })
            .await?;
        let version = etag(&group)?;
        Ok((group, version))
    }

    /// List groups the checker allows the caller to see.
    ///
    /// In [`ListMode::Full`] bindings for all groups are loaded in bulk
    /// with a fixed number of store queries.
    pub async fn list<C>(&self, context: &Context, checker: &C, mode: ListMode) -> Result<GroupList>
    where
        C: PermissionChecker + ?Sized,
    {
        let context = context
            .derive()
            .deadline(self.transaction_timeout)
            .log_trace()
            .build();
        slog::debug!(context.logger, "Listing authorization groups"; "mode" => ?mode);
        let groups = self
            .store
            .transaction(&context, move |tx| {
                let groups = tx.query(ListGroups)?;
                let list = match mode {
                    ListMode::Full => GroupList::Full(group_views(tx, &groups, GroupFilter::All)?),
                    ListMode::Locators => GroupList::Locators(
                        groups
                            .into_iter()
                            .map(|group| EntityUrl::auth_group(group.name))
                            .collect(),
                    ),
                };
                Ok(list)
            })
            .await?;

        let groups = match groups {
            GroupList::Full(mut groups) => {
                groups.retain(|group| checker.allowed(&EntityUrl::auth_group(group.name.as_str())));
                GroupList::Full(groups)
            }
            GroupList::Locators(mut urls) => {
                urls.retain(|url| checker.allowed(url));
                GroupList::Locators(urls)
            }
        };
        Ok(groups)
    }

    /// Initialise the service with dependencies from the [`Injector`].
    pub fn new(injector: &Injector) -> GroupService {
        GroupService {
            events: injector.events.clone(),
            invalidator: injector.invalidator.clone(),
            store: injector.store.clone(),
            transaction_timeout: injector.conf.groups.transaction_timeout(),
        }
    }

    /// Add permissions to a group and optionally update its description.
    ///
    /// Permissions the group already has are skipped and only new permissions are bound.
    /// The description is updated only when the request has a non-empty description.
    pub async fn patch(
        &self,
        context: &Context,
        name: &str,
        expected_version: Option<String>,
        request: AuthGroupPut,
    ) -> Result<()> {
        let context = self.op_context(context, name);
        slog::debug!(context.logger, "Patching authorization group");
        let group_name = name.to_string();
        self.store
            .transaction(&context, move |tx| {
                let group = find_group(tx, &group_name)?;
                let current = load_group(tx, &group)?;
                check_version(&current, expected_version.as_deref())?;

                if !request.description.is_empty() {
                    tx.persist(UpdateGroupDescription {
                        description: request.description,
                        group_id: group.id,
                    })?;
                }

                let requested: Vec<Permission> = request
                    .permissions
                    .into_iter()
                    .filter(|permission| !current.permissions.contains(permission))
                    .collect();
                let additions: Vec<ValidatedPermission> = validate_permissions(&requested)?
                    .into_iter()
                    .filter(|permission| !current.permissions.contains(&wire_permission(permission)))
                    .collect();
                bind_permissions(tx, group.id, BindMode::Append, &additions)
            })
            .await?;

        slog::info!(context.logger, "Authorization group patched");
        self.emit(&context, AUTH_GROUP_UPDATED, name, None).await;
        Ok(())
    }

    /// Rename a group.
    ///
    /// The identity cache of all cluster nodes is refreshed once the group is renamed.
    /// Renaming a group to its current name changes nothing.
    pub async fn rename(
        &self,
        context: &Context,
        name: &str,
        request: AuthGroupPost,
    ) -> Result<EntityUrl> {
        let context = self.op_context(context, name);
        slog::debug!(context.logger, "Renaming authorization group"; "new_name" => &request.name);
        validate_group_name(&request.name)?;

        let old_name = name.to_string();
        let new_name = request.name.clone();
        let renamed = self
            .store
            .transaction(&context, move |tx| {
                let group = find_group(tx, &old_name)?;
                if group.name == new_name {
                    return Ok(false);
                }
                if tx.query(LookupGroup::from(new_name.as_str()))?.is_some() {
                    anyhow::bail!(GroupAlreadyExists::new(new_name));
                }
                tx.persist(RenameGroup {
                    group_id: group.id,
                    name: new_name,
                })?;
                Ok(true)
            })
            .await?;

        let url = EntityUrl::auth_group(request.name.as_str());
        if !renamed {
            return Ok(url);
        }
        slog::info!(
            context.logger, "Authorization group renamed";
            "old_name" => name,
            "new_name" => &request.name,
        );
        let invalidated = self.invalidate(&context, MutationKind::Rename).await;
        self.emit(&context, AUTH_GROUP_RENAMED, &request.name, Some(name))
            .await;
        invalidated.map(|_| url)
    }

    /// Replace the description and permissions of a group.
    ///
    /// Permissions not in the request are unbound from the group.
    pub async fn replace(
        &self,
        context: &Context,
        name: &str,
        expected_version: Option<String>,
        request: AuthGroupPut,
    ) -> Result<()> {
        let context = self.op_context(context, name);
        slog::debug!(context.logger, "Replacing authorization group");
        let permissions = validate_permissions(&request.permissions)?;
        let description = request.description;
        let group_name = name.to_string();
        self.store
            .transaction(&context, move |tx| {
                let group = find_group(tx, &group_name)?;
                if expected_version.is_some() {
                    let current = load_group(tx, &group)?;
                    check_version(&current, expected_version.as_deref())?;
                }
                tx.persist(UpdateGroupDescription {
                    description,
                    group_id: group.id,
                })?;
                bind_permissions(tx, group.id, BindMode::Replace, &permissions)
            })
            .await?;

        slog::info!(context.logger, "Authorization group replaced");
        self.emit(&context, AUTH_GROUP_UPDATED, name, None).await;
        Ok(())
    }
}

impl GroupService {
    async fn emit(&self, context: &Context, code: &str, name: &str, old_name: Option<&str>) {
        match group_event(code, name, old_name) {
            Ok(event) => self.events.change_or_log(context, event).await,
            Err(error) => slog::error!(
                context.logger,
                "Failed to encode group lifecycle event";
                "code" => code,
                "error" => format!("{:#}", error),
            ),
        }
    }

    async fn invalidate(&self, context: &Context, kind: MutationKind) -> Result<()> {
        let result = self.invalidator.broadcast_and_refresh(context, kind).await;
        if let Err(error) = &result {
            slog::warn!(
                context.logger,
                "Cluster identity cache invalidation failed";
                "kind" => kind.as_str(),
                "error" => format!("{:#}", error),
            );
        }
        result
    }

    fn op_context(&self, context: &Context, name: &str) -> Context {
        context
            .derive()
            .deadline(self.transaction_timeout)
            .log_values(slog::o!("group" => name.to_string()))
            .log_trace()
            .build()
    }
}

/// Bind permissions to a group, creating missing permission records.
fn bind_permissions(
    tx: &mut Transaction<'_>,
    group_id: i64,
    mode: BindMode,
    permissions: &[ValidatedPermission],
) -> Result<()> {
    if mode == BindMode::Append && permissions.is_empty() {
        return Ok(());
    }
    let mut permission_ids = upsert_permissions(tx, permissions)?;
    let mut seen = std::collections::HashSet::new();
    permission_ids.retain(|id| seen.insert(*id));
    tx.persist(BindGroupPermissions {
        group_id,
        mode,
        permission_ids,
    })
}

fn check_version(group: &AuthGroup, expected: Option<&str>) -> Result<()> {
    if let Some(expected) = expected {
        if etag(group)? != expected {
            anyhow::bail!(GroupVersionMismatch::new(&group.name));
        }
    }
    Ok(())
}

fn find_group(tx: &mut Transaction<'_>, name: &str) -> Result<GroupRecord> {
    match tx.query(LookupGroup::from(name))? {
        Some(group) => Ok(group),
        None => anyhow::bail!(GroupNotFound::new(name)),
    }
}

fn validate_permissions(permissions: &[Permission]) -> Result<Vec<ValidatedPermission>, InvalidPermission> {
    permissions
        .iter()
        .map(|permission| {
            validate_permission(
                &permission.entity_type,
                &permission.entity_reference,
                &permission.entitlement,
            )
        })
        .collect()
}
