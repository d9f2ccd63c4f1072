use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use entigraph_shared::{
    pagination::{COUNT_HEADER, LIMIT_HEADER, OFFSET_HEADER, PaginationMetadata},
    reference::EntityId,
    wire::{
        ApiProblem, CreateDefinitionRequest, CreateEntityRequest, CreateRelationRequest,
        EntityRoute, ListResponse,
    },
};

use crate::{auth::AuthManager, config::Config, retry_async};

const RETRY_DELAY_SECS: u64 = 2;

/// Outcome of a create call. Transport failures and unexpected statuses are
/// errors; the remaining statuses the service documents are variants.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateResponse {
    Created(Value),
    Conflict(ApiProblem),
    NotFound(ApiProblem),
    Invalid(ApiProblem),
}

impl CreateResponse {
    pub fn into_result(self) -> Result<Value> {
        match self {
            CreateResponse::Created(v) => Ok(v),
            CreateResponse::Conflict(p) => Err(anyhow!("already exists: {p}")),
            CreateResponse::NotFound(p) => Err(anyhow!("not found: {p}")),
            CreateResponse::Invalid(p) => Err(anyhow!("validation failed: {p}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    Found(Value),
    NotFound(ApiProblem),
}

#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub name: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: u32,
    pub offset: u64,
    pub include_relations: bool,
}

impl EntityQuery {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(label) = &self.label_selector {
            pairs.push(("labelSelector", label.clone()));
        }
        if let Some(field) = &self.field_selector {
            pairs.push(("fieldSelector", field.clone()));
        }
        if self.include_relations {
            pairs.push(("includeRelations", "true".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityPage {
    pub items: Vec<Value>,
    pub relations: Vec<Value>,
    pub pagination: Option<PaginationMetadata>,
}

/// Remote operations the backup and restore engine depends on.
#[async_trait]
pub trait EntityApi: Send + Sync {
    async fn list_definitions(&self) -> Result<Vec<Value>>;
    async fn list_entities(&self, query: &EntityQuery) -> Result<EntityPage>;
    async fn get_entity(&self, id: &EntityId) -> Result<FetchResponse>;
    async fn create_definition(&self, body: &CreateDefinitionRequest) -> Result<CreateResponse>;
    async fn create_entity(
        &self,
        route: &EntityRoute,
        body: &CreateEntityRequest,
    ) -> Result<CreateResponse>;
    async fn create_relation(
        &self,
        namespace: &str,
        body: &CreateRelationRequest,
    ) -> Result<CreateResponse>;
}

pub struct ApiClient {
    api_url: String,
    token: String,
    client: Client,
    retries: u32,
}

impl ApiClient {
    pub fn new(
        api_url: &str,
        token: &str,
        trust_invalid_server_cert: bool,
        retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client: get_client(trust_invalid_server_cert)?,
            retries: retries.max(1),
        })
    }

    pub async fn from_config() -> Result<Self> {
        let token = AuthManager::get_cli_token().await?;
        let config = Config::load()?;
        Self::new(
            &config.api_url,
            &token,
            config.trust_invalid_server_cert,
            config.request_retries,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_url, path)
    }

    async fn post_create<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<CreateResponse> {
        debug!("POST {}", url);
        let res = retry_async!(
            self.retries,
            RETRY_DELAY_SECS,
            self.client.post(url).bearer_auth(&self.token).json(body).send()
        )?;
        decode_create(res).await
    }
}

#[async_trait]
impl EntityApi for ApiClient {
    async fn list_definitions(&self) -> Result<Vec<Value>> {
        let url = self.url("definitions");
        let res = retry_async!(
            self.retries,
            RETRY_DELAY_SECS,
            self.client.get(&url).bearer_auth(&self.token).send()
        )?;
        match res.error_for_status() {
            Ok(r) => {
                let body: ListResponse = r.json().await.context("invalid definition list")?;
                Ok(body.items)
            }
            Err(e) => Err(anyhow!(e)),
        }
    }

    async fn list_entities(&self, query: &EntityQuery) -> Result<EntityPage> {
        let url = self.url("entities");
        let pairs = query.query_pairs();
        let res = retry_async!(
            self.retries,
            RETRY_DELAY_SECS,
            self.client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&pairs)
                .send()
        )?;
        match res.error_for_status() {
            Ok(r) => {
                let pagination = pagination_from_headers(r.headers());
                let body: ListResponse = r.json().await.context("invalid entity list")?;
                Ok(EntityPage {
                    items: body.items,
                    relations: body.relations,
                    pagination,
                })
            }
            Err(e) => Err(anyhow!(e)),
        }
    }

    async fn get_entity(&self, id: &EntityId) -> Result<FetchResponse> {
        let url = self.url(&format!(
            "entities/{}/{}/namespaces/{}/{}/{}",
            id.group, id.version, id.namespace, id.plural, id.name
        ));
        let res = retry_async!(
            self.retries,
            RETRY_DELAY_SECS,
            self.client.get(&url).bearer_auth(&self.token).send()
        )?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(FetchResponse::NotFound(read_problem(res).await));
        }
        match res.error_for_status() {
            Ok(r) => Ok(FetchResponse::Found(r.json().await?)),
            Err(e) => Err(anyhow!(e)),
        }
    }

    async fn create_definition(&self, body: &CreateDefinitionRequest) -> Result<CreateResponse> {
        self.post_create(&self.url("definitions"), body).await
    }

    async fn create_entity(
        &self,
        route: &EntityRoute,
        body: &CreateEntityRequest,
    ) -> Result<CreateResponse> {
        let url = self.url(&format!(
            "entities/{}/{}/namespaces/{}/{}",
            route.group, route.version, route.namespace, route.plural
        ));
        self.post_create(&url, body).await
    }

    async fn create_relation(
        &self,
        namespace: &str,
        body: &CreateRelationRequest,
    ) -> Result<CreateResponse> {
        let url = self.url(&format!("namespaces/{}/relations", namespace));
        self.post_create(&url, body).await
    }
}

async fn decode_create(res: Response) -> Result<CreateResponse> {
    let status = res.status();
    if status.is_success() {
        let text = res.text().await?;
        if text.trim().is_empty() {
            return Ok(CreateResponse::Created(Value::Null));
        }
        let value = serde_json::from_str(&text).context("invalid create response body")?;
        return Ok(CreateResponse::Created(value));
    }
    let problem = read_problem(res).await;
    match status {
        StatusCode::CONFLICT => Ok(CreateResponse::Conflict(problem)),
        StatusCode::NOT_FOUND => Ok(CreateResponse::NotFound(problem)),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Ok(CreateResponse::Invalid(problem))
        }
        other => Err(anyhow!("unexpected status {other}: {problem}")),
    }
}

async fn read_problem(res: Response) -> ApiProblem {
    let text = res.text().await.unwrap_or_default();
    parse_problem(&text)
}

fn parse_problem(text: &str) -> ApiProblem {
    match serde_json::from_str::<ApiProblem>(text) {
        Ok(p) if !p.message.is_empty() => p,
        _ => ApiProblem {
            message: text.trim().to_string(),
            details: None,
        },
    }
}

fn pagination_from_headers(headers: &HeaderMap) -> Option<PaginationMetadata> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    };
    Some(PaginationMetadata {
        count: read(COUNT_HEADER)?,
        offset: read(OFFSET_HEADER).unwrap_or(0),
        limit: read(LIMIT_HEADER).unwrap_or(0) as u32,
    })
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub async fn refresh_access_token(
    api_url: &str,
    refresh_token: &str,
    trust_invalid_server_cert: bool,
    retries: u32,
) -> Result<TokenResponse> {
    let url = format!("{}/v1/auth/token", api_url.trim_end_matches('/'));
    let client = get_client(trust_invalid_server_cert)?;
    let body = RefreshRequest {
        grant_type: "refresh_token",
        refresh_token,
    };

    let res = retry_async!(
        retries.max(1),
        RETRY_DELAY_SECS,
        client.post(&url).form(&body).send()
    )?;
    match res.error_for_status() {
        Ok(r) => Ok(r.json().await?),
        Err(e) => Err(anyhow!(e)),
    }
}

fn get_client(trust_invalid_server_cert: bool) -> Result<Client> {
    // self-hosted deployments frequently run with self-signed certificates
    if trust_invalid_server_cert {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(client)
    } else {
        Ok(Client::new())
    }
}
