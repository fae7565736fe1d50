#![allow(dead_code)]

use async_trait::async_trait;
use dataverse_client::api::{CredentialPrompt, Query, Record, RecordService, WhoAmI};
use dataverse_client::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Rows kept per table, in insertion order, plus a log of every call.
#[derive(Default)]
pub struct Store {
    pub tables: HashMap<String, Vec<Record>>,
    pub calls: Vec<String>,
    pub closed: bool,
}

impl Store {
    pub fn rows(&self, entity: &str) -> usize {
        self.tables.get(entity).map(|t| t.len()).unwrap_or(0)
    }

    fn find(&self, entity: &str, id: Uuid) -> Option<&Record> {
        self.tables.get(entity)?.iter().find(|r| r.id() == Some(id))
    }

    fn find_mut(&mut self, entity: &str, id: Uuid) -> Option<&mut Record> {
        self.tables.get_mut(entity)?.iter_mut().find(|r| r.id() == Some(id))
    }
}

/// A `RecordService` backed by memory, shared with the test through `store`.
#[derive(Clone)]
pub struct InMemoryService {
    pub store: Arc<Mutex<Store>>,
    pub user_id: Uuid,
    ignore_top: bool,
    fail_on: Option<&'static str>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            user_id: Uuid::new_v4(),
            ignore_top: false,
            fail_on: None,
        }
    }

    /// Return every row from queries, like a server that ignores `$top`.
    pub fn ignoring_top(mut self) -> Self {
        self.ignore_top = true;
        self
    }

    /// Make the named operation fail with a 500.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Insert a row directly and return its id.
    pub fn seed(&self, entity: &str, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let record = Record::with_id(entity, id).field("name", name);
        self.store
            .lock()
            .unwrap()
            .tables
            .entry(entity.to_string())
            .or_default()
            .push(record);
        id
    }

    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    fn enter(&self, operation: &str) -> Result<()> {
        self.store.lock().unwrap().calls.push(operation.to_string());
        if self.fail_on == Some(operation) {
            return Err(Error::Request {
                status: 500,
                reason: "Internal Server Error".to_string(),
                message: Some(format!("{} failed", operation)),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordService for InMemoryService {
    async fn who_am_i(&self) -> Result<WhoAmI> {
        self.enter("who_am_i")?;
        Ok(WhoAmI {
            user_id: self.user_id,
            business_unit_id: Uuid::nil(),
            organization_id: Uuid::nil(),
        })
    }

    async fn create(&self, record: &Record) -> Result<Uuid> {
        self.enter("create")?;
        let id = Uuid::new_v4();
        let mut stored = record.clone();
        stored.assign_id(id)?;
        self.store
            .lock()
            .unwrap()
            .tables
            .entry(record.logical_name().to_string())
            .or_default()
            .push(stored);
        Ok(id)
    }

    async fn retrieve(&self, entity: &str, id: Uuid, columns: &[String]) -> Result<Record> {
        self.enter("retrieve")?;
        let store = self.store.lock().unwrap();
        let mut record = store
            .find(entity, id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                entity: entity.to_string(),
                id,
            })?;
        // Real servers may add columns nobody asked for
        record.set("versionnumber", 1234_i64);
        if columns.is_empty() {
            return Ok(record);
        }
        let mut projected = Record::with_id(entity, id);
        for column in columns {
            if let Some(value) = record.get(column) {
                projected.set(column.clone(), value.clone());
            }
        }
        projected.set("versionnumber", 1234_i64);
        Ok(projected)
    }

    async fn update(&self, record: &Record) -> Result<()> {
        self.enter("update")?;
        let id = record
            .id()
            .ok_or_else(|| Error::InvalidRecord("no id".to_string()))?;
        let mut store = self.store.lock().unwrap();
        let stored = store
            .find_mut(record.logical_name(), id)
            .ok_or_else(|| Error::NotFound {
                entity: record.logical_name().to_string(),
                id,
            })?;
        for (name, value) in record.fields() {
            stored.set(name, value.clone());
        }
        Ok(())
    }

    async fn delete(&self, entity: &str, id: Uuid) -> Result<()> {
        self.enter("delete")?;
        let mut store = self.store.lock().unwrap();
        let table = store.tables.entry(entity.to_string()).or_default();
        let before = table.len();
        table.retain(|r| r.id() != Some(id));
        if table.len() == before {
            return Err(Error::NotFound {
                entity: entity.to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn retrieve_multiple(&self, query: &Query) -> Result<Vec<Record>> {
        self.enter("retrieve_multiple")?;
        let store = self.store.lock().unwrap();
        let rows = store.tables.get(&query.entity).cloned().unwrap_or_default();
        let limit = match (self.ignore_top, query.top) {
            (false, Some(top)) => top as usize,
            _ => rows.len(),
        };
        Ok(rows.into_iter().take(limit).collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn close(&self) {
        let mut store = self.store.lock().unwrap();
        store.calls.push("close".to_string());
        store.closed = true;
    }
}

/// Prompt that refuses; tests never sit at a terminal.
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn username(&self, _url: &str) -> anyhow::Result<String> {
        anyhow::bail!("no terminal in tests")
    }

    fn password(&self, _username: &str) -> anyhow::Result<String> {
        anyhow::bail!("no terminal in tests")
    }
}

/// Local server whose 200 responses promise 100 body bytes, send a few, then
/// hang up.
pub async fn truncated_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"value\"",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

/// Consume the request head and any declared body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}
