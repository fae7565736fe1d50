//! Web API paths and headers

/// Dataverse Web API version
pub const API_VERSION: &str = "v9.2";

/// Base API path
pub const API_BASE_PATH: &str = "/api/data";

/// Unbound function returning the caller's identity
pub const WHO_AM_I: &str = "WhoAmI";

/// Full API path with version
pub fn api_path() -> String {
    format!("{}/{}", API_BASE_PATH, API_VERSION)
}

pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    pub const ODATA_VERSION: &str = "4.0";

    /// Response header carrying the URI of a newly created record
    pub const ODATA_ENTITY_ID: &str = "OData-EntityId";

    /// If-Match value that makes PATCH fail instead of creating a record
    pub const IF_MATCH_ANY: &str = "*";
}

/// Resource path (relative to [`api_path`]) of a whole entity set
pub fn collection_path(entity_set: &str) -> String {
    entity_set.to_string()
}

/// Resource path (relative to [`api_path`]) of a single record
pub fn record_path(entity_set: &str, id: &uuid::Uuid) -> String {
    format!("{}({})", entity_set, id)
}

/// Absolute URL for a resource path
pub fn resource_url(base_url: &str, path: &str) -> String {
    format!("{}{}/{}", base_url.trim_end_matches('/'), api_path(), path.trim_start_matches('/'))
}
