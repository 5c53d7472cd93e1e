//! Parse and format entity locators.
//!
//! Locators are URL paths that identify an entity in a human readable way:
//!
//! ```text
//! /instances/web-01?project=staging
//! /storage-pools/default/volumes/custom/data
//! /auth/groups/operators
//! ```
//!
//! A leading `/1.0` API version segment is accepted and ignored.
//! Entities in the default project omit the `project` query parameter in canonical form.
use std::fmt;

use url::Url;

use crate::EntityType;

/// Name of the project entities belong to when none is specified.
pub const DEFAULT_PROJECT: &str = "default";

/// Base URL used to parse locator paths.
const PARSE_BASE: &str = "http://authcore.invalid/";

/// API version segment that can optionally prefix locators.
const VERSION_SEGMENT: &str = "1.0";

/// The entity locator is not valid.
#[derive(Debug, thiserror::Error)]
pub enum InvalidLocator {
    /// The locator is not a URL path.
    #[error("entity locator '{0}' must be an absolute URL path")]
    NotAPath(String),

    /// The locator could not be parsed as a URL.
    #[error("entity locator '{0}' is not a valid URL")]
    Malformed(String),

    /// The locator does not match any known entity type.
    #[error("entity locator '{0}' does not refer to a known entity type")]
    UnknownEntity(String),

    /// The locator specifies a project for an entity not scoped to projects.
    #[error("entity locator '{0}' sets a project but the entity is not project scoped")]
    UnexpectedProject(String),

    /// The locator includes unsupported query parameters.
    #[error("entity locator '{0}' includes unsupported query parameter '{1}'")]
    UnsupportedQuery(String, String),

    /// The entity path does not have the number of arguments expected for the entity type.
    #[error("entity type '{0}' expects {1} path argument(s) but {2} were given")]
    ArgumentsCount(EntityType, usize, usize),
}

/// Parsed entity locator.
///
/// Two locators referring to the same entity are equal regardless of how they were written
/// (for example with or without the API version prefix or the default project).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntityUrl {
    entity_type: EntityType,
    project: Option<String>,
    args: Vec<String>,
}

impl EntityUrl {
    /// Locator of an authorisation group.
    pub fn auth_group<S: Into<String>>(name: S) -> EntityUrl {
        EntityUrl {
            entity_type: EntityType::AuthGroup,
            project: None,
            args: vec![name.into()],
        }
    }

    /// Arguments identifying the entity (such as its name), in path order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Type of the entity this locator refers to.
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Build a locator from its parts, checking the arguments match the entity type.
    ///
    /// Project scoped entities default to the [`DEFAULT_PROJECT`] when no project is given.
    pub fn new<I, S>(
        entity_type: EntityType,
        project: Option<&str>,
        args: I,
    ) -> Result<EntityUrl, InvalidLocator>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let expected = path_template(entity_type).iter().filter(|s| s.is_none()).count();
        if args.len() != expected {
            return Err(InvalidLocator::ArgumentsCount(
                entity_type,
                expected,
                args.len(),
            ));
        }
        let project = match (entity_type.is_project_scoped(), project) {
            (true, project) => Some(project.unwrap_or(DEFAULT_PROJECT).to_string()),
            (false, None) => None,
            (false, Some(project)) => {
                let path = render_path(entity_type, &args);
                return Err(InvalidLocator::UnexpectedProject(format!(
                    "{}?project={}",
                    path, project
                )));
            }
        };
        Ok(EntityUrl {
            entity_type,
            project,
            args,
        })
    }

    /// Parse an entity locator string.
    pub fn parse(locator: &str) -> Result<EntityUrl, InvalidLocator> {
        if !locator.starts_with('/') || locator.starts_with("//") {
            return Err(InvalidLocator::NotAPath(locator.to_string()));
        }

        // URL joining would silently normalise dot-segments and drop fragments.
        let raw_path = locator.split(['?', '#']).next().unwrap_or_default();
        let dot_segment = raw_path
            .split(['/', '\\'])
            .map(str::to_ascii_lowercase)
            .any(|segment| {
                matches!(
                    segment.as_str(),
                    "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
                )
            });
        if dot_segment || locator.contains('#') {
            return Err(InvalidLocator::Malformed(locator.to_string()));
        }
        let base =
            Url::parse(PARSE_BASE).map_err(|_| InvalidLocator::Malformed(locator.to_string()))?;
        let url = base
            .join(locator)
            .map_err(|_| InvalidLocator::Malformed(locator.to_string()))?;

        // Decode path segments, ignoring the optional API version prefix.
        let mut segments = Vec::new();
        if let Some(raw) = url.path_segments() {
            for segment in raw {
                let segment = urlencoding::decode(segment)
                    .map_err(|_| InvalidLocator::Malformed(locator.to_string()))?;
                segments.push(segment.into_owned());
            }
        }
        if segments.len() == 1 && segments[0].is_empty() {
            segments.clear();
        }
        if segments.first().map(String::as_str) == Some(VERSION_SEGMENT) {
            segments.remove(0);
        }
        if segments.iter().any(String::is_empty) {
            return Err(InvalidLocator::Malformed(locator.to_string()));
        }

        // Extract supported query parameters.
        let mut project = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "project" => project = Some(value.into_owned()),
                _ => {
                    return Err(InvalidLocator::UnsupportedQuery(
                        locator.to_string(),
                        key.into_owned(),
                    ))
                }
            }
        }

        // Match the path against known entity paths.
        let (entity_type, args) = EntityType::ALL
            .iter()
            .find_map(|entity_type| {
                match_template(path_template(*entity_type), &segments)
                    .map(|args| (*entity_type, args))
            })
            .ok_or_else(|| InvalidLocator::UnknownEntity(locator.to_string()))?;
        if project.is_some() && !entity_type.is_project_scoped() {
            return Err(InvalidLocator::UnexpectedProject(locator.to_string()));
        }
        EntityUrl::new(entity_type, project.as_deref(), args)
    }

    /// Project the entity belongs to, for project scoped entities.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Locator of the server entity.
    pub fn server() -> EntityUrl {
        EntityUrl {
            entity_type: EntityType::Server,
            project: None,
            args: Vec::new(),
        }
    }
}

impl fmt::Display for EntityUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_path(self.entity_type, &self.args))?;
        match self.project.as_deref() {
            Some(project) if project != DEFAULT_PROJECT => {
                write!(f, "?project={}", urlencoding::encode(project))
            }
            _ => Ok(()),
        }
    }
}

/// Path template for entity types.
///
/// Fixed segments are `Some` while entity arguments are `None`.
fn path_template(entity_type: EntityType) -> &'static [Option<&'static str>] {
    match entity_type {
        EntityType::AuthGroup => &[Some("auth"), Some("groups"), None],
        EntityType::Certificate => &[Some("certificates"), None],
        EntityType::Identity => &[Some("auth"), Some("identities"), None, None],
        EntityType::IdentityProviderGroup => {
            &[Some("auth"), Some("identity-provider-groups"), None]
        }
        EntityType::Image => &[Some("images"), None],
        EntityType::Instance => &[Some("instances"), None],
        EntityType::Network => &[Some("networks"), None],
        EntityType::Profile => &[Some("profiles"), None],
        EntityType::Project => &[Some("projects"), None],
        EntityType::Server => &[],
        EntityType::StoragePool => &[Some("storage-pools"), None],
        EntityType::StorageVolume => &[Some("storage-pools"), None, Some("volumes"), None, None],
    }
}

fn match_template(template: &[Option<&str>], segments: &[String]) -> Option<Vec<String>> {
    if template.len() != segments.len() {
        return None;
    }
    let mut args = Vec::new();
    for (expected, segment) in template.iter().zip(segments) {
        match expected {
            Some(fixed) if fixed != segment => return None,
            Some(_) => (),
            None => args.push(segment.clone()),
        }
    }
    Some(args)
}

fn render_path(entity_type: EntityType, args: &[String]) -> String {
    let template = path_template(entity_type);
    if template.is_empty() {
        return String::from("/");
    }
    let mut args = args.iter();
    let mut path = String::new();
    for segment in template {
        path.push('/');
        match segment {
            Some(fixed) => path.push_str(fixed),
            None => {
                let arg = args.next().map(String::as_str).unwrap_or_default();
                path.push_str(&urlencoding::encode(arg));
            }
        }
    }
    path
}
