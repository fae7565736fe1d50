//! Session-style client built from a connection string.
//!
//! Unlike [`WebApiClient`], a `ServiceClient` keeps the credentials it was
//! connected with, re-acquires its token once it expires, and has an
//! explicit lifetime: after [`ServiceClient::close`] every call fails.

use super::auth::{AuthManager, TokenInfo};
use super::entity_set::EntitySetResolver;
use super::query::Query;
use super::record::Record;
use super::service::{RecordService, WhoAmI};
use super::web_api::WebApiClient;
use crate::connection::ConnectionSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct ServiceClient {
    settings: ConnectionSettings,
    auth: AuthManager,
    token: RwLock<TokenInfo>,
    http_client: reqwest::Client,
    entity_sets: EntitySetResolver,
    closed: AtomicBool,
}

impl ServiceClient {
    /// Parse `connection_string`, sign in and open a session.
    pub async fn connect(connection_string: &str, auth: AuthManager) -> Result<Self> {
        let settings = ConnectionSettings::parse(connection_string)?;
        Self::from_settings(settings, auth).await
    }

    /// Open a session for already parsed settings.
    pub async fn from_settings(settings: ConnectionSettings, auth: AuthManager) -> Result<Self> {
        let token = auth.acquire(&settings).await?;

        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("dataverse-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        log::info!("Connected to {}", settings.url);

        Ok(Self {
            settings,
            auth,
            token: RwLock::new(token),
            http_client,
            entity_sets: EntitySetResolver::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_entity_sets(mut self, entity_sets: EntitySetResolver) -> Self {
        self.entity_sets = entity_sets;
        self
    }

    pub fn url(&self) -> &str {
        &self.settings.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Web API view of the session with a valid token.
    async fn api(&self) -> Result<WebApiClient> {
        if self.is_closed() {
            return Err(Error::configuration("session closed"));
        }

        {
            let token = self.token.read().await;
            if !token.is_expired() {
                return Ok(self.web_api(&token.access_token));
            }
        }

        let mut token = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if token.is_expired() {
            log::warn!("Access token for {} expired, re-authenticating", self.settings.url);
            *token = self.auth.acquire(&self.settings).await?;
        }
        Ok(self.web_api(&token.access_token))
    }

    fn web_api(&self, access_token: &str) -> WebApiClient {
        WebApiClient::with_http_client(
            self.settings.url.clone(),
            access_token,
            self.http_client.clone(),
        )
        .with_entity_sets(self.entity_sets.clone())
    }
}

#[async_trait]
impl RecordService for ServiceClient {
    async fn who_am_i(&self) -> Result<WhoAmI> {
        self.api().await?.who_am_i().await
    }

    async fn create(&self, record: &Record) -> Result<Uuid> {
        RecordService::create(&self.api().await?, record).await
    }

    async fn retrieve(&self, entity: &str, id: Uuid, columns: &[String]) -> Result<Record> {
        self.api().await?.retrieve(entity, id, columns).await
    }

    async fn update(&self, record: &Record) -> Result<()> {
        self.api().await?.update(record).await
    }

    async fn delete(&self, entity: &str, id: Uuid) -> Result<()> {
        RecordService::delete(&self.api().await?, entity, id).await
    }

    async fn retrieve_multiple(&self, query: &Query) -> Result<Vec<Record>> {
        self.api().await?.retrieve_multiple(query).await
    }

    fn name(&self) -> &'static str {
        "sdk"
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::info!("Closed session for {}", self.settings.url);
        }
    }
}

impl Drop for ServiceClient {
    fn drop(&mut self) {
        if !self.is_closed() {
            log::warn!("Session for {} dropped without close", self.settings.url);
            self.close();
        }
    }
}
