//! Entity types, entitlements and entity locators that permissions are built from.
//!
//! A permission grants an [`Entitlement`] on a specific entity.
//! Entities are addressed externally by locators ([`EntityUrl`]) and internally by
//! an [`EntityRef`] (the entity type and a numeric ID stable for the lifetime of the entity).
//!
//! Which entitlements are meaningful depends on the entity type:
//! [`EntityType::entitlements`] lists the legal combinations.
//! The [`validate_permission`] function checks user provided permissions against all of the above.
use serde::Deserialize;
use serde::Serialize;

mod entitlement;
mod entity_type;
mod locator;
mod validate;

pub use self::entitlement::Entitlement;
pub use self::entitlement::UnknownEntitlement;
pub use self::entity_type::EntityType;
pub use self::entity_type::UnknownEntityType;
pub use self::locator::EntityUrl;
pub use self::locator::InvalidLocator;
pub use self::locator::DEFAULT_PROJECT;
pub use self::validate::validate_permission;
pub use self::validate::ValidatedPermission;

/// Entity ID assigned to the (one and only) server entity.
pub const SERVER_ENTITY_ID: i64 = 0;

/// Internal reference to an entity: its type and numeric ID.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct EntityRef {
    /// Type of the entity referenced.
    pub entity_type: EntityType,

    /// Numeric ID of the entity, unique within the entity type.
    pub entity_id: i64,
}

impl EntityRef {
    /// Reference an entity by type and ID.
    pub fn new(entity_type: EntityType, entity_id: i64) -> EntityRef {
        EntityRef {
            entity_type,
            entity_id,
        }
    }
}
