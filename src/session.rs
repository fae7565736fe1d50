//! Opening a [`RecordClient`] from loaded settings.

use crate::api::{AuthManager, EntitySetResolver, RecordClient, RecordService, ServiceClient, WebApiClient};
use crate::config::{AppSettings, ENTITY_SET_NAMES_SECTION};
use crate::connection::ConnectionSettings;
use crate::error::Result;
use clap::ValueEnum;
use std::fmt;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Transport {
    /// Session opened from the connection string, token refreshed as needed
    #[default]
    #[value(name = "sdk")]
    Sdk,
    /// Raw Web API calls with a token acquired once
    #[value(name = "http")]
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Sdk => write!(f, "sdk"),
            Transport::Http => write!(f, "http"),
        }
    }
}

/// Resolve the named connection string and sign in over `transport`.
///
/// Configuration problems (missing entry, malformed string) are reported
/// before any request is sent.
pub async fn open_record_client(
    settings: &AppSettings,
    connection_name: &str,
    transport: Transport,
    auth: AuthManager,
) -> Result<RecordClient> {
    let connection_string = settings.connection_string(connection_name)?;
    let connection = ConnectionSettings::parse(&connection_string)?;
    log::debug!("Connection '{}': {:?}", connection_name, connection);

    let entity_sets = EntitySetResolver::with_overrides(settings.section(ENTITY_SET_NAMES_SECTION));

    let service: Box<dyn RecordService> = match transport {
        Transport::Sdk => Box::new(
            ServiceClient::from_settings(connection, auth)
                .await?
                .with_entity_sets(entity_sets),
        ),
        Transport::Http => Box::new(
            WebApiClient::connect(&connection, &auth)
                .await?
                .with_entity_sets(entity_sets),
        ),
    };

    Ok(RecordClient::new(service))
}
