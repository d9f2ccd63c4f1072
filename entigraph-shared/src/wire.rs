use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::reference::EntityReference;

/// The service's envelope for optional fields: `{"set": true, "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optional<T> {
    pub set: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

impl<T> Optional<T> {
    pub fn some(value: T) -> Self {
        Self {
            set: true,
            value: Some(value),
        }
    }

    pub fn unset() -> Self {
        Self {
            set: false,
            value: None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        if self.set { self.value } else { None }
    }
}

impl<T> From<Option<T>> for Optional<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Optional::some(v),
            None => Optional::unset(),
        }
    }
}

impl<T> Default for Optional<T> {
    fn default() -> Self {
        Optional::unset()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefinitionRequest {
    pub group: String,
    pub kind: String,
    pub list_kind: String,
    pub plural: Optional<String>,
    pub singular: String,
    pub name: Optional<String>,
    pub description: Optional<String>,
    pub spec: Value,
    pub storage: Optional<bool>,
    pub served: Optional<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntityMetadata {
    pub name: String,
    pub namespace: String,
    pub labels: Optional<BTreeMap<String, String>>,
    pub annotations: Optional<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityRequest {
    pub api_version: String,
    pub kind: String,
    pub metadata: CreateEntityMetadata,
    pub spec: Optional<Value>,
    pub status: Optional<Value>,
}

/// Path parameters of the create-entity endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRoute {
    pub group: String,
    pub version: String,
    pub namespace: String,
    pub plural: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRelationRequest {
    pub relation: String,
    pub source: EntityReference,
    pub target: EntityReference,
    pub namespace: String,
}

/// Body of list endpoints. The entity listing embeds relations when asked to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub relations: Vec<Value>,
}

/// Error body returned by the service on 4xx responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl std::fmt::Display for ApiProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} ({})", self.message, details),
            None => f.write_str(&self.message),
        }
    }
}
