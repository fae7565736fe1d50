//! Application settings loaded once at start-up.
//!
//! The settings file is a nested JSON document (`appsettings.json`) or, when
//! the path ends in `.toml`, the TOML equivalent. Values are looked up by a
//! key whose segments are separated by `:` or `.`, e.g.
//! `ConnectionStrings:MyEnv`. Segment matching ignores ASCII case.

use crate::error::{Error, Result};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";
pub const CONNECTION_STRINGS_SECTION: &str = "ConnectionStrings";
pub const ENTITY_SET_NAMES_SECTION: &str = "EntitySetNames";

/// Separator used by environment variable overrides (`ConnectionStrings__MyEnv`).
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    root: Map<String, Value>,
    overrides: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl AppSettings {
    /// Load settings from `path`. A missing file is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from: {:?}", path);

        if !path.exists() {
            return Err(Error::configuration(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut settings = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
        .map_err(|e| match e {
            Error::Configuration(message) => {
                Error::configuration(format!("{} ({})", message, path.display()))
            }
            other => other,
        })?;

        settings.source = Some(path.to_path_buf());
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Like [`AppSettings::load`], but a missing file yields empty settings.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("Settings file {} doesn't exist, using empty settings", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse settings JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let value: Value = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse settings TOML: {}", e)))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self {
                root,
                overrides: BTreeMap::new(),
                source: None,
            }),
            other => Err(Error::configuration(format!(
                "Settings root must be an object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Apply `Section__Key` style variables on top of the file contents.
    /// Variables without the separator, or that are not valid UTF-8, are
    /// ignored, so `std::env::vars_os()` can be passed as is.
    pub fn merge_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (name, value) in vars {
            let (Some(name), Some(value)) = (name.as_ref().to_str(), value.as_ref().to_str()) else {
                debug!("Skipping non UTF-8 environment variable {:?}", name.as_ref());
                continue;
            };
            if !name.contains(ENV_SEPARATOR) {
                continue;
            }
            let key = normalize_key(&name.replace(ENV_SEPARATOR, ":"));
            debug!("Settings override from environment: {}", key);
            self.overrides.insert(key, value.to_string());
        }
    }

    /// Path the settings were loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Look up a scalar value. Objects, arrays and nulls read as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(&normalize_key(key)) {
            return Some(value.clone());
        }

        match self.lookup(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Look up a scalar value that must be present.
    pub fn require(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(Error::configuration(format!("Setting '{}' is empty", key))),
            None => Err(Error::configuration(format!(
                "Setting '{}' not found{}",
                key,
                self.source
                    .as_ref()
                    .map(|p| format!(" in {}", p.display()))
                    .unwrap_or_default()
            ))),
        }
    }

    /// The named entry of the `ConnectionStrings` section.
    pub fn connection_string(&self, name: &str) -> Result<String> {
        self.require(&format!("{}:{}", CONNECTION_STRINGS_SECTION, name))
    }

    /// Scalar children of a section, keyed by their name as written.
    /// Environment overrides for the section are included.
    pub fn section(&self, key: &str) -> HashMap<String, String> {
        let mut entries = HashMap::new();

        if let Some(Value::Object(map)) = self.lookup(key) {
            for (name, value) in map {
                let scalar = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                entries.insert(name.clone(), scalar);
            }
        }

        let prefix = format!("{}:", normalize_key(key));
        for (name, value) in &self.overrides {
            if let Some(child) = name.strip_prefix(&prefix) {
                if !child.contains(':') {
                    // Overrides are normalized, so replace any differently-cased entry.
                    entries.retain(|k, _| !k.eq_ignore_ascii_case(child));
                    entries.insert(child.to_string(), value.clone());
                }
            }
        }

        entries
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut segments = split_key(key);
        let first = segments.next()?;
        let mut current = find_ignore_case(&self.root, first)?;

        for segment in segments {
            match current {
                Value::Object(map) => current = find_ignore_case(map, segment)?,
                _ => return None,
            }
        }

        Some(current)
    }
}

/// Locate the settings file: an explicit path wins, then `./appsettings.json`,
/// then the per-user config directory.
pub fn discover_settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = PathBuf::from(DEFAULT_SETTINGS_FILE);
    if local.exists() {
        return local;
    }

    if let Some(user_path) = user_settings_path() {
        if user_path.exists() {
            debug!("Using user settings file: {:?}", user_path);
            return user_path;
        }
    }

    local
}

/// `<config dir>/dataverse-client/appsettings.json`, when the platform has a
/// config directory.
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dataverse-client").join(DEFAULT_SETTINGS_FILE))
}

fn split_key(key: &str) -> impl Iterator<Item = &str> {
    key.split(|c| c == ':' || c == '.').map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_key(key: &str) -> String {
    split_key(key)
        .map(|s| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(":")
}

fn find_ignore_case<'a>(map: &'a Map<String, Value>, segment: &str) -> Option<&'a Value> {
    map.get(segment).or_else(|| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(segment))
            .map(|(_, value)| value)
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
