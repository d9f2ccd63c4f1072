//! Backup envelopes: the wrapper-free on-disk form of definitions, entities
//! and relations. Server-managed fields (ids, timestamps, resource versions)
//! are not part of these types and are dropped when a record is built.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::reference::{default_plural, split_api_version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionRecord {
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub list_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(default)]
    pub singular: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served: Option<bool>,
}

impl DefinitionRecord {
    /// Key used by the kind -> plural lookup during restore.
    pub fn lookup_key(&self) -> String {
        format!("{}/{}", self.group, self.kind)
    }

    pub fn resolved_plural(&self) -> String {
        match self.plural.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => default_plural(&self.kind),
        }
    }

    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.group, self.kind.to_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: EntityMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl EntityRecord {
    /// `(group, version)` with the group defaulting to `core`.
    pub fn group_version(&self) -> (String, String) {
        split_api_version(&self.api_version)
    }

    pub fn file_stem(&self) -> String {
        let (group, version) = self.group_version();
        format!(
            "{}_{}_{}_{}_{}",
            group,
            version,
            self.metadata.namespace,
            self.kind.to_lowercase(),
            self.metadata.name
        )
    }

    pub fn lookup_key(&self) -> String {
        let (group, _) = self.group_version();
        format!("{}/{}", group, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub relation: String,
    /// Canonical reference string, see [`crate::reference::format`].
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
