//! The record operations the rest of the crate uses, over either transport.

use super::query::{Query, RecordSet};
use super::record::Record;
use super::service::{RecordService, WhoAmI};
use crate::error::{Error, Result};
use uuid::Uuid;

pub struct RecordClient {
    service: Box<dyn RecordService>,
}

impl RecordClient {
    pub fn new(service: Box<dyn RecordService>) -> Self {
        Self { service }
    }

    /// Which transport backs this client (`sdk` or `http`).
    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    pub async fn who_am_i(&self) -> Result<WhoAmI> {
        let identity = self.service.who_am_i().await?;
        log::info!("WhoAmI: user {}", identity.user_id);
        Ok(identity)
    }

    /// Create `record` and store the assigned id on it.
    pub async fn create(&self, record: &mut Record) -> Result<Uuid> {
        if let Some(id) = record.id() {
            return Err(Error::InvalidRecord(format!(
                "{} {} already exists; create needs a new record",
                record.logical_name(),
                id
            )));
        }

        let id = self.service.create(record).await?;
        record.assign_id(id)?;
        log::info!("Created {} {}", record.logical_name(), id);
        Ok(id)
    }

    /// Fetch `columns` of one row. Only those columns come back.
    pub async fn retrieve(&self, entity: &str, id: Uuid, columns: &[&str]) -> Result<Record> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut record = self.service.retrieve(entity, id, &columns).await?;
        if !columns.is_empty() {
            record.retain_fields(&columns);
        }
        log::info!("Retrieved {} {}", entity, id);
        Ok(record)
    }

    /// Send the fields present on `record`; other columns are untouched.
    pub async fn update(&self, record: &Record) -> Result<()> {
        let id = record.id().ok_or_else(|| {
            Error::InvalidRecord(format!("Cannot update {} without an id", record.logical_name()))
        })?;

        self.service.update(record).await?;
        log::info!("Updated {} {} ({} fields)", record.logical_name(), id, record.len());
        Ok(())
    }

    pub async fn delete(&self, entity: &str, id: Uuid) -> Result<()> {
        self.service.delete(entity, id).await?;
        log::info!("Deleted {} {}", entity, id);
        Ok(())
    }

    /// Run `query`. The result never holds more than `query.top` rows.
    pub async fn query(&self, query: &Query) -> Result<RecordSet> {
        let mut records = self.service.retrieve_multiple(query).await?;
        if let Some(top) = query.top {
            records.truncate(top as usize);
        }
        log::info!("Query on {} returned {} records", query.entity, records.len());
        Ok(RecordSet::new(records))
    }

    /// Release the underlying session.
    pub fn close(&self) {
        self.service.close();
    }
}
