use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

pub const ENTITY_SCHEME: &str = "entity://";
pub const DEFAULT_GROUP: &str = "core";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("invalid entity id {id:?}: expected group/version/plural/namespace/name, got {segments} segments")]
    Format { id: String, segments: usize },
    #[error("invalid entity id {id:?}: empty segment")]
    EmptySegment { id: String },
}

/// Parsed form of `[entity://]<group>/<version>/<plural>/<namespace>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub group: String,
    pub version: String,
    pub plural: String,
    pub namespace: String,
    pub name: String,
}

impl EntityId {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn to_reference(&self) -> EntityReference {
        build_reference(
            &self.group,
            &self.version,
            &self.plural,
            &self.namespace,
            &self.name,
        )
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format(
            &self.group,
            &self.version,
            &self.plural,
            &self.namespace,
            &self.name,
        ))
    }
}

impl std::str::FromStr for EntityId {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Typed reference as the service expects it in relation payloads.
/// `kind` carries the plural form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EntityReference {
    pub fn to_id(&self) -> EntityId {
        let (group, version) = split_api_version(&self.api_version);
        EntityId::new(group, version, &self.kind, &self.namespace, &self.name)
    }
}

pub fn parse(id: &str) -> Result<EntityId, ReferenceError> {
    let trimmed = id.strip_prefix(ENTITY_SCHEME).unwrap_or(id);
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() != 5 {
        return Err(ReferenceError::Format {
            id: id.to_string(),
            segments: parts.len(),
        });
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ReferenceError::EmptySegment { id: id.to_string() });
    }
    Ok(EntityId::new(parts[0], parts[1], parts[2], parts[3], parts[4]))
}

pub fn format(group: &str, version: &str, plural: &str, namespace: &str, name: &str) -> String {
    format!("{group}/{version}/{plural}/{namespace}/{name}")
}

pub fn build_reference(
    group: &str,
    version: &str,
    plural: &str,
    namespace: &str,
    name: &str,
) -> EntityReference {
    EntityReference {
        api_version: format!("{group}/{version}"),
        kind: plural.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// `"g/v"` -> `("g", "v")`, a bare `"v"` falls into the `core` group.
pub fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) if !group.is_empty() => (group.to_string(), version.to_string()),
        Some((_, version)) => (DEFAULT_GROUP.to_string(), version.to_string()),
        None => (DEFAULT_GROUP.to_string(), api_version.to_string()),
    }
}

/// Naive pluralization used when a definition carries no explicit plural.
/// Irregular plurals are not handled ("Policy" -> "policys").
pub fn default_plural(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}
