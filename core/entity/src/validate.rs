//! Validation of user provided permissions.
use authcore_errors::InvalidPermission;

use crate::Entitlement;
use crate::EntityType;
use crate::EntityUrl;

/// A permission that passed validation, with all its parts parsed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ValidatedPermission {
    pub entitlement: Entitlement,
    pub entity_type: EntityType,
    pub entity_url: EntityUrl,
}

/// Validate a permission as provided by users.
///
/// Checks are performed in order and the first failure is returned:
///
/// 1. The entity type is known.
/// 2. The entitlement is known.
/// 3. The entity reference is a valid locator.
/// 4. The locator refers to an entity of the given type.
/// 5. The entitlement can be granted on entities of the given type.
pub fn validate_permission(
    entity_type: &str,
    entity_reference: &str,
    entitlement: &str,
) -> Result<ValidatedPermission, InvalidPermission> {
    let invalid = |reason: String| InvalidPermission {
        entitlement: entitlement.to_string(),
        entity_reference: entity_reference.to_string(),
        reason,
    };

    let parsed_type: EntityType = entity_type
        .parse()
        .map_err(|error: crate::UnknownEntityType| invalid(error.to_string()))?;
    let parsed_entitlement: Entitlement = entitlement
        .parse()
        .map_err(|error: crate::UnknownEntitlement| invalid(error.to_string()))?;
    let entity_url = EntityUrl::parse(entity_reference).map_err(|error| invalid(error.to_string()))?;
    if entity_url.entity_type() != parsed_type {
        return Err(invalid(format!(
            "entity type '{}' does not match the entity reference type '{}'",
            parsed_type,
            entity_url.entity_type(),
        )));
    }
    if !parsed_type.allows(parsed_entitlement) {
        return Err(invalid(format!(
            "entitlement '{}' cannot be granted on entities of type '{}'",
            parsed_entitlement, parsed_type,
        )));
    }
    Ok(ValidatedPermission {
        entitlement: parsed_entitlement,
        entity_type: parsed_type,
        entity_url,
    })
}
