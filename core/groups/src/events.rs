//! Lifecycle events emitted when groups change.
use anyhow::Result;
use serde::Serialize;

use authcore_events::Event;

/// Event code emitted after a group is created.
pub const AUTH_GROUP_CREATED: &str = "AUTH_GROUP_CREATED";

/// Event code emitted after a group is deleted.
pub const AUTH_GROUP_DELETED: &str = "AUTH_GROUP_DELETED";

/// Event code emitted after a group is renamed.
pub const AUTH_GROUP_RENAMED: &str = "AUTH_GROUP_RENAMED";

/// Event code emitted after a group description or permissions are updated.
pub const AUTH_GROUP_UPDATED: &str = "AUTH_GROUP_UPDATED";

/// Payload of group lifecycle events.
#[derive(Serialize)]
struct GroupChanged<'a> {
    name: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    old_name: Option<&'a str>,
}

/// Build a lifecycle event for the named group.
pub fn group_event(code: &str, name: &str, old_name: Option<&str>) -> Result<Event> {
    let payload = GroupChanged { name, old_name };
    let event = Event::new_with_payload(code, payload)?.with_metadata("group", name);
    Ok(event)
}
