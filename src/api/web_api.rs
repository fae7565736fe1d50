//! Raw Web API client: bearer token plus plain HTTP verbs on resource paths.

use super::auth::AuthManager;
use super::constants::{self, headers};
use super::entity_set::EntitySetResolver;
use super::query::{Query, QueryResponse};
use super::record::Record;
use super::service::{RecordService, WhoAmI};
use crate::connection::ConnectionSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Status, headers and JSON body of a successful Web API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

/// Dataverse Web API client with a fixed bearer token
#[derive(Clone)]
pub struct WebApiClient {
    base_url: String,
    http_client: reqwest::Client,
    access_token: String,
    entity_sets: EntitySetResolver,
}

impl WebApiClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("dataverse-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http_client(base_url, access_token, http_client))
    }

    /// Create a client around an existing HTTP client configuration
    pub fn with_http_client(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            access_token: access_token.into(),
            entity_sets: EntitySetResolver::new(),
        }
    }

    /// Acquire a token for `settings` once and bind it to a new client.
    pub async fn connect(settings: &ConnectionSettings, auth: &AuthManager) -> Result<Self> {
        let token = auth.acquire(settings).await?;
        Self::new(settings.url.clone(), token.access_token)
    }

    pub fn with_entity_sets(mut self, entity_sets: EntitySetResolver) -> Self {
        self.entity_sets = entity_sets;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn entity_set(&self, logical_name: &str) -> String {
        self.entity_sets.resolve(logical_name)
    }

    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<ApiResponse> {
        self.send(Method::GET, path, params, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, &[], Some(body), &[]).await
    }

    /// PATCH with `If-Match: *`, so a missing record is a 404 rather than an upsert.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(
            Method::PATCH,
            path,
            &[],
            Some(body),
            &[("If-Match", headers::IF_MATCH_ANY)],
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, &[], None, &[]).await
    }

    /// Send one authenticated request. Non-success statuses become errors.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let url = constants::resource_url(&self.base_url, path);
        log::debug!("{} {}", method, url);

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(&self.access_token)
            .header("Accept", headers::CONTENT_TYPE_JSON)
            .header("OData-Version", headers::ODATA_VERSION)
            .header("OData-MaxVersion", headers::ODATA_VERSION);

        if !params.is_empty() {
            request = request.query(params);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", headers::CONTENT_TYPE_JSON)
                .json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        log::debug!("{} {} -> {}", method, url, status);

        let mut response_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                response_headers.insert(name.as_str().to_ascii_lowercase(), value_str.to_string());
            }
        }

        let text = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(&text)?)
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            headers: response_headers,
            body,
        })
    }
}

/// Map a non-success response to the error taxonomy. The OData error
/// message, when the body has one, rides along with the reason phrase.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

    if status == StatusCode::UNAUTHORIZED {
        return Error::authentication(format!(
            "Token rejected ({}){}",
            status,
            message.map(|m| format!(": {}", m)).unwrap_or_default()
        ));
    }

    Error::Request {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        message,
    }
}

/// Turn a 404 on a record-addressed call into [`Error::NotFound`].
pub(crate) fn not_found(error: Error, entity: &str, id: Uuid) -> Error {
    match error {
        Error::Request { status: 404, .. } => Error::NotFound {
            entity: entity.to_string(),
            id,
        },
        other => other,
    }
}

/// Extract the GUID from an `OData-EntityId` value such as
/// `https://contoso.crm.dynamics.com/api/data/v9.2/accounts(00000000-...)`.
pub(crate) fn id_from_entity_uri(uri: &str) -> Option<Uuid> {
    let open = uri.rfind('(')?;
    let close = uri[open..].find(')')? + open;
    Uuid::try_parse(&uri[open + 1..close]).ok()
}

#[async_trait]
impl RecordService for WebApiClient {
    async fn who_am_i(&self) -> Result<WhoAmI> {
        let response = self.get(constants::WHO_AM_I, &[]).await?;
        let body = response.body.unwrap_or(Value::Null);
        Ok(serde_json::from_value(body)?)
    }

    async fn create(&self, record: &Record) -> Result<Uuid> {
        let entity_set = self.entity_set(record.logical_name());
        let response = self
            .post(&constants::collection_path(&entity_set), &record.to_payload())
            .await?;

        if let Some(id) = response
            .header(headers::ODATA_ENTITY_ID)
            .and_then(id_from_entity_uri)
        {
            return Ok(id);
        }

        // Prefer: return=representation puts the row in the body instead
        response
            .body
            .as_ref()
            .and_then(|body| body.get(record.primary_id_field()))
            .and_then(|id| id.as_str())
            .and_then(|id| Uuid::try_parse(id).ok())
            .ok_or_else(|| Error::Request {
                status: response.status,
                reason: "No record id".to_string(),
                message: Some(format!(
                    "Create of {} returned neither {} nor {}",
                    record.logical_name(),
                    headers::ODATA_ENTITY_ID,
                    record.primary_id_field()
                )),
            })
    }

    async fn retrieve(&self, entity: &str, id: Uuid, columns: &[String]) -> Result<Record> {
        let path = constants::record_path(&self.entity_set(entity), &id);
        let params = if columns.is_empty() {
            Vec::new()
        } else {
            vec![("$select".to_string(), columns.join(","))]
        };

        let response = self
            .get(&path, &params)
            .await
            .map_err(|e| not_found(e, entity, id))?;

        let body = response.body.unwrap_or(Value::Null);
        let mut record = Record::from_payload(entity, &body)?;
        record.assign_id(id)?;
        Ok(record)
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let id = record.id().ok_or_else(|| {
            Error::InvalidRecord(format!("Cannot update {} without an id", record.logical_name()))
        })?;
        let path = constants::record_path(&self.entity_set(record.logical_name()), &id);

        self.patch(&path, &record.to_payload())
            .await
            .map_err(|e| not_found(e, record.logical_name(), id))?;
        Ok(())
    }

    async fn delete(&self, entity: &str, id: Uuid) -> Result<()> {
        let path = constants::record_path(&self.entity_set(entity), &id);
        WebApiClient::delete(self, &path)
            .await
            .map_err(|e| not_found(e, entity, id))?;
        Ok(())
    }

    async fn retrieve_multiple(&self, query: &Query) -> Result<Vec<Record>> {
        let path = constants::collection_path(&self.entity_set(&query.entity));
        let response = self.get(&path, &query.to_query_params()).await?;
        let body = response.body.unwrap_or(Value::Null);

        let page = QueryResponse::from_json(body)?;
        if page.next_link.is_some() {
            log::debug!("Ignoring further pages for {}", query.entity);
        }
        page.into_records(&query.entity)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
