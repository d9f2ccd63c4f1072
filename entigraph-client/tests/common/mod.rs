//! In-memory service and reporter shared by the backup/restore tests.

#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use entigraph_client::entity::report::Reporter;
use entigraph_client::server::{
    CreateResponse, EntityApi, EntityPage, EntityQuery, FetchResponse,
};
use entigraph_shared::{
    pagination::PaginationMetadata,
    reference::EntityId,
    wire::{
        ApiProblem, CreateDefinitionRequest, CreateEntityRequest, CreateRelationRequest,
        EntityRoute,
    },
};

#[derive(Debug, Clone)]
pub enum Call {
    Definition(CreateDefinitionRequest),
    Entity(EntityRoute, CreateEntityRequest),
    Relation(String, CreateRelationRequest),
}

#[derive(Default)]
pub struct FakeApi {
    pub definitions: Vec<Value>,
    pub entities: Vec<Value>,
    pub relations: Vec<Value>,
    pub fail_definition_list: bool,
    pub fail_entity_list: bool,
    pub fail_relation_list: bool,
    /// Entity names whose create call answers 409.
    pub conflicting: Vec<String>,
    /// Entity names whose create call panics.
    pub panicking: Vec<String>,
    pub calls: Mutex<Vec<Call>>,
    pub queries: Mutex<Vec<EntityQuery>>,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<EntityQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EntityApi for FakeApi {
    async fn list_definitions(&self) -> Result<Vec<Value>> {
        if self.fail_definition_list {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.definitions.clone())
    }

    async fn list_entities(&self, query: &EntityQuery) -> Result<EntityPage> {
        self.queries.lock().unwrap().push(query.clone());
        if query.include_relations {
            if self.fail_relation_list {
                return Err(anyhow!("gateway timeout"));
            }
            return Ok(EntityPage {
                items: Vec::new(),
                relations: self.relations.clone(),
                pagination: None,
            });
        }
        if self.fail_entity_list {
            return Err(anyhow!("503 service unavailable"));
        }

        let start = (query.offset as usize).min(self.entities.len());
        let end = (start + query.limit as usize).min(self.entities.len());
        Ok(EntityPage {
            items: self.entities[start..end].to_vec(),
            relations: Vec::new(),
            pagination: Some(PaginationMetadata {
                count: self.entities.len() as u64,
                offset: query.offset,
                limit: query.limit,
            }),
        })
    }

    async fn get_entity(&self, id: &EntityId) -> Result<FetchResponse> {
        let found = self.entities.iter().find(|e| {
            e["metadata"]["name"] == id.name.as_str()
                && e["metadata"]["namespace"] == id.namespace.as_str()
        });
        Ok(match found {
            Some(e) => FetchResponse::Found(e.clone()),
            None => FetchResponse::NotFound(ApiProblem {
                message: format!("{id} not found"),
                details: None,
            }),
        })
    }

    async fn create_definition(&self, body: &CreateDefinitionRequest) -> Result<CreateResponse> {
        self.record(Call::Definition(body.clone()));
        Ok(CreateResponse::Created(Value::Null))
    }

    async fn create_entity(
        &self,
        route: &EntityRoute,
        body: &CreateEntityRequest,
    ) -> Result<CreateResponse> {
        if self.panicking.contains(&body.metadata.name) {
            panic!("create_entity crashed on {}", body.metadata.name);
        }
        self.record(Call::Entity(route.clone(), body.clone()));
        if self.conflicting.contains(&body.metadata.name) {
            return Ok(CreateResponse::Conflict(ApiProblem {
                message: format!("{} exists", body.metadata.name),
                details: None,
            }));
        }
        Ok(CreateResponse::Created(Value::Null))
    }

    async fn create_relation(
        &self,
        namespace: &str,
        body: &CreateRelationRequest,
    ) -> Result<CreateResponse> {
        self.record(Call::Relation(namespace.to_string(), body.clone()));
        Ok(CreateResponse::Created(Value::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Info(String),
    Success(String),
    Warn(String),
    Error(String),
}

#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<Line>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap().clone()
    }

    pub fn infos_starting_with(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Info(s) if s.starts_with(prefix) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Warn(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Error(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Info(message.to_string()));
    }

    fn success(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Success(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Warn(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Error(message.to_string()));
    }
}
