//! Dataverse Web API access.
//!
//! Two transports implement [`RecordService`]: [`ServiceClient`], a session
//! opened from a connection string, and [`WebApiClient`], a plain bearer-token
//! HTTP client. [`RecordClient`] sits on top of either one.

pub mod auth;
pub mod constants;
pub mod entity_set;
pub mod query;
pub mod record;
pub mod record_client;
pub mod service;
pub mod service_client;
pub mod web_api;

pub use auth::{AuthManager, CredentialPrompt, CredentialSet, TerminalPrompt, TokenInfo};
pub use entity_set::EntitySetResolver;
pub use query::{Query, RecordSet};
pub use record::{FieldValue, Record};
pub use record_client::RecordClient;
pub use service::{RecordService, WhoAmI};
pub use service_client::ServiceClient;
pub use web_api::{ApiResponse, WebApiClient};
