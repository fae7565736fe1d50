//! Connection string parsing.
//!
//! Accepts the platform's `key=value;key=value` connection strings, e.g.
//!
//! ```text
//! AuthType=OAuth;Url=https://contoso.crm.dynamics.com;Username=jsmith@contoso.com;
//!     Password=passcode;AppId=51f81489-12ee-4a9e-aaae-a2591f45987d;LoginPrompt=Auto
//! AuthType=ClientSecret;Url=https://contoso.crm.dynamics.com;ClientId=...;ClientSecret=...
//! ```
//!
//! or a bare endpoint URL, in which case a pre-issued bearer token is
//! expected in `DATAVERSE_ACCESS_TOKEN`.

use crate::api::auth::CredentialSet;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Environment variable holding a pre-issued token for bare-URL connections.
pub const ACCESS_TOKEN_VAR: &str = "DATAVERSE_ACCESS_TOKEN";

/// Public client id the platform documents for samples and prototyping.
pub const DEFAULT_APP_ID: &str = "51f81489-12ee-4a9e-aaae-a2591f45987d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginPrompt {
    /// Prompt only for values the connection string leaves out.
    #[default]
    Auto,
    /// Always prompt for the password.
    Always,
    /// Never prompt; missing values are an authentication error.
    Never,
}

impl FromStr for LoginPrompt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(Error::configuration(format!(
                "Unknown LoginPrompt '{}' (expected Auto, Always or Never)",
                other
            ))),
        }
    }
}

/// Everything needed to reach and authenticate against one environment.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Environment URL without trailing slash, e.g. `https://contoso.crm.dynamics.com`.
    pub url: String,
    pub credentials: CredentialSet,
    pub login_prompt: LoginPrompt,
    /// Identity provider base URL, e.g. `https://login.microsoftonline.com`.
    pub authority: Option<String>,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &self.url)
            .field("auth", &self.credentials.kind())
            .field("login_prompt", &self.login_prompt)
            .field("authority", &self.authority)
            .finish()
    }
}

impl ConnectionSettings {
    /// Parse a connection string, reading `DATAVERSE_ACCESS_TOKEN` for bare URLs.
    pub fn parse(connection_string: &str) -> Result<Self> {
        Self::parse_with_token(connection_string, std::env::var(ACCESS_TOKEN_VAR).ok())
    }

    /// Parse a connection string; `access_token` is used when it is a bare URL.
    pub fn parse_with_token(connection_string: &str, access_token: Option<String>) -> Result<Self> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(Error::configuration("Connection string is empty"));
        }

        if !trimmed.contains('=') {
            let url = normalize_url(trimmed)?;
            let token = access_token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                Error::configuration(format!(
                    "Connection string is a bare URL; set {} to a bearer token",
                    ACCESS_TOKEN_VAR
                ))
            })?;
            return Ok(Self {
                url,
                credentials: CredentialSet::AccessToken(token),
                login_prompt: LoginPrompt::Never,
                authority: None,
            });
        }

        let pairs = parse_pairs(trimmed)?;
        let value = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|name| pairs.get(*name))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        let url = value(&["url", "serviceuri", "server"])
            .ok_or_else(|| Error::configuration("Connection string has no Url"))?;
        let url = normalize_url(&url)?;

        let login_prompt = match value(&["loginprompt"]) {
            Some(v) => v.parse()?,
            None => LoginPrompt::default(),
        };
        let tenant_id = value(&["tenantid", "tenant"]);
        let authority = value(&["authority"]).map(|a| a.trim_end_matches('/').to_string());

        let auth_type = value(&["authtype"]).unwrap_or_else(|| "OAuth".to_string());
        let credentials = match auth_type.to_ascii_lowercase().as_str() {
            "oauth" | "office365" => CredentialSet::UsernamePassword {
                username: value(&["username", "user", "userid"]),
                password: value(&["password", "pwd"]),
                client_id: value(&["appid", "clientid"]).unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
                client_secret: value(&["clientsecret", "secret"]),
                tenant_id,
            },
            "clientsecret" => {
                let client_id = value(&["clientid", "appid"]).ok_or_else(|| {
                    Error::configuration("AuthType=ClientSecret requires ClientId")
                })?;
                let client_secret = value(&["clientsecret", "secret"]).ok_or_else(|| {
                    Error::configuration("AuthType=ClientSecret requires ClientSecret")
                })?;
                CredentialSet::ClientCredentials {
                    client_id,
                    client_secret,
                    tenant_id,
                }
            }
            other => {
                return Err(Error::configuration(format!(
                    "Unsupported AuthType '{}' (expected OAuth or ClientSecret)",
                    other
                )));
            }
        };

        Ok(Self {
            url,
            credentials,
            login_prompt,
            authority,
        })
    }
}

/// Split `key=value;...` into lowercase keys and values. A value that starts
/// with `'` or `"` runs to the matching quote, so it may contain `;`.
fn parse_pairs(connection_string: &str) -> Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    let mut rest = connection_string;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            return Ok(pairs);
        }

        let segment_end = rest.find(';').unwrap_or(rest.len());
        let eq = match rest.find(|c: char| c == '=' || c == ';') {
            Some(i) if rest.as_bytes()[i] == b'=' => i,
            _ => return Err(malformed(&rest[..segment_end])),
        };
        let key = rest[..eq].trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(malformed(&rest[..segment_end]));
        }

        let value_part = rest[eq + 1..].trim_start();
        let (value, remainder) = match value_part.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                let close = value_part[1..].find(quote).ok_or_else(|| {
                    Error::configuration(format!("Unterminated quote in connection string value for '{}'", key))
                })? + 1;
                let after = value_part[close + 1..].trim_start();
                if !after.is_empty() && !after.starts_with(';') {
                    return Err(Error::configuration(format!(
                        "Unexpected text after quoted connection string value for '{}'",
                        key
                    )));
                }
                (value_part[1..close].to_string(), after)
            }
            _ => {
                let end = value_part.find(';').unwrap_or(value_part.len());
                (value_part[..end].trim().to_string(), &value_part[end..])
            }
        };

        pairs.insert(key, value);
        rest = remainder;
    }
}

fn malformed(segment: &str) -> Error {
    Error::configuration(format!("Malformed connection string segment '{}'", segment.trim()))
}

fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .ok_or_else(|| Error::configuration(format!("Url '{}' must start with https://", url)))?;
    if rest.is_empty() {
        return Err(Error::configuration(format!("Url '{}' has no host", url)));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_connection_string() {
        let settings = ConnectionSettings::parse_with_token(
            "AuthType=OAuth; Url=https://contoso.crm.dynamics.com/; Username=jsmith@contoso.com; \
             Password=passcode; AppId=11111111-2222-3333-4444-555555555555; \
             RedirectUri=app://58145B91-0C36-4500-8554-080854F2AC97; LoginPrompt=Never",
            None,
        )
        .unwrap();

        assert_eq!(settings.url, "https://contoso.crm.dynamics.com");
        assert_eq!(settings.login_prompt, LoginPrompt::Never);
        match settings.credentials {
            CredentialSet::UsernamePassword {
                username,
                password,
                client_id,
                client_secret,
                tenant_id,
            } => {
                assert_eq!(username.as_deref(), Some("jsmith@contoso.com"));
                assert_eq!(password.as_deref(), Some("passcode"));
                assert_eq!(client_id, "11111111-2222-3333-4444-555555555555");
                assert_eq!(client_secret, None);
                assert_eq!(tenant_id, None);
            }
            other => panic!("unexpected credentials: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_keys_ignore_case_and_quotes() {
        let settings = ConnectionSettings::parse_with_token(
            "authtype=oauth;URL='https://contoso.crm4.dynamics.com';username=\"a@b.c\"",
            None,
        )
        .unwrap();
        assert_eq!(settings.url, "https://contoso.crm4.dynamics.com");
        assert_eq!(settings.login_prompt, LoginPrompt::Auto);
        match settings.credentials {
            CredentialSet::UsernamePassword {
                username,
                password,
                client_id,
                ..
            } => {
                assert_eq!(username.as_deref(), Some("a@b.c"));
                assert_eq!(password, None);
                assert_eq!(client_id, DEFAULT_APP_ID);
            }
            other => panic!("unexpected credentials: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_quoted_values_keep_separators() {
        let settings = ConnectionSettings::parse_with_token(
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;Username=a@b.c;Password='pa;ss';\
             ClientSecret=\"x'y;z=\" ;LoginPrompt=Never",
            None,
        )
        .unwrap();
        assert_eq!(settings.login_prompt, LoginPrompt::Never);
        match settings.credentials {
            CredentialSet::UsernamePassword {
                password,
                client_secret,
                ..
            } => {
                assert_eq!(password.as_deref(), Some("pa;ss"));
                assert_eq!(client_secret.as_deref(), Some("x'y;z="));
            }
            other => panic!("unexpected credentials: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_bad_quoting() {
        for bad in [
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;Password='pa;ss",
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;Password='pa'ss;Username=a@b.c",
        ] {
            let err = ConnectionSettings::parse_with_token(bad, None).unwrap_err();
            assert!(err.is_configuration(), "expected configuration error for {:?}", bad);
        }
    }

    #[test]
    fn test_client_secret_connection_string() {
        let settings = ConnectionSettings::parse_with_token(
            "AuthType=ClientSecret;Url=https://contoso.crm.dynamics.com;ClientId=app;\
             ClientSecret=s3cret;TenantId=contoso.onmicrosoft.com;Authority=http://localhost:9000/",
            None,
        )
        .unwrap();

        assert_eq!(settings.authority.as_deref(), Some("http://localhost:9000"));
        match settings.credentials {
            CredentialSet::ClientCredentials {
                client_id,
                client_secret,
                tenant_id,
            } => {
                assert_eq!(client_id, "app");
                assert_eq!(client_secret, "s3cret");
                assert_eq!(tenant_id.as_deref(), Some("contoso.onmicrosoft.com"));
            }
            other => panic!("unexpected credentials: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_client_secret_requires_secret() {
        let err = ConnectionSettings::parse_with_token(
            "AuthType=ClientSecret;Url=https://contoso.crm.dynamics.com;ClientId=app",
            None,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ClientSecret"));
    }

    #[test]
    fn test_bare_url_uses_token() {
        let settings = ConnectionSettings::parse_with_token(
            "https://contoso.crm.dynamics.com/",
            Some("eyJ0eXAi".to_string()),
        )
        .unwrap();
        assert_eq!(settings.url, "https://contoso.crm.dynamics.com");
        assert!(matches!(settings.credentials, CredentialSet::AccessToken(ref t) if t == "eyJ0eXAi"));
    }

    #[test]
    fn test_bare_url_without_token() {
        let err = ConnectionSettings::parse_with_token("https://contoso.crm.dynamics.com", None)
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains(ACCESS_TOKEN_VAR));
    }

    #[test]
    fn test_malformed_strings() {
        for bad in [
            "",
            "   ",
            "AuthType=OAuth;Username=a@b.c",
            "AuthType=OAuth;Url=contoso.crm.dynamics.com",
            "AuthType=Certificate;Url=https://contoso.crm.dynamics.com",
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;LoginPrompt=Sometimes",
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;garbage",
            "AuthType=OAuth;Url=https://",
        ] {
            let err = ConnectionSettings::parse_with_token(bad, None).unwrap_err();
            assert!(err.is_configuration(), "expected configuration error for {:?}", bad);
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let settings = ConnectionSettings::parse_with_token(
            "AuthType=OAuth;Url=https://contoso.crm.dynamics.com;Username=a@b.c;Password=hunter2",
            None,
        )
        .unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("contoso"));
    }
}
