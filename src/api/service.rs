//! The capability both transports provide.

use super::query::Query;
use super::record::Record;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response of the `WhoAmI` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmI {
    #[serde(rename = "UserId")]
    pub user_id: Uuid,
    #[serde(rename = "BusinessUnitId")]
    pub business_unit_id: Uuid,
    #[serde(rename = "OrganizationId")]
    pub organization_id: Uuid,
}

/// Authenticated record operations against one environment.
///
/// Implementations send exactly one request per call and never retry.
/// Record-addressed calls report a missing row as [`crate::Error::NotFound`].
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Identity of the authenticated caller.
    async fn who_am_i(&self) -> Result<WhoAmI>;

    /// Create `record` and return the id the platform assigned.
    async fn create(&self, record: &Record) -> Result<Uuid>;

    /// Fetch one row with the given columns.
    async fn retrieve(&self, entity: &str, id: Uuid, columns: &[String]) -> Result<Record>;

    /// Change the fields present on `record`, which must carry an id.
    async fn update(&self, record: &Record) -> Result<()>;

    async fn delete(&self, entity: &str, id: Uuid) -> Result<()>;

    /// Run a flat query; rows come back in platform order.
    async fn retrieve_multiple(&self, query: &Query) -> Result<Vec<Record>>;

    /// Short transport name for logs and console output.
    fn name(&self) -> &'static str;

    /// Release the session. Transports without one have nothing to do.
    fn close(&self) {}
}
