use crate::connection::{ConnectionSettings, LoginPrompt};
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Identity provider used when the connection string names no `Authority`.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tenant segment for password grants without an explicit `TenantId`.
const DEFAULT_TENANT: &str = "organizations";

/// Tokens are considered expired this long before the provider says so.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Fallback lifetime when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// How the caller proves its identity.
#[derive(Clone)]
pub enum CredentialSet {
    /// Delegated sign-in as a user. Missing values may be prompted for.
    UsernamePassword {
        username: Option<String>,
        password: Option<String>,
        client_id: String,
        client_secret: Option<String>,
        tenant_id: Option<String>,
    },
    /// Application identity with a client secret.
    ClientCredentials {
        client_id: String,
        client_secret: String,
        tenant_id: Option<String>,
    },
    /// A bearer token issued elsewhere.
    AccessToken(String),
}

impl CredentialSet {
    /// Short name for logs; never includes secrets.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSet::UsernamePassword { .. } => "username_password",
            CredentialSet::ClientCredentials { .. } => "client_credentials",
            CredentialSet::AccessToken(_) => "access_token",
        }
    }
}

/// A bearer token and when it stops being usable.
#[derive(Clone)]
pub struct TokenInfo {
    pub access_token: String,
    /// `None` for tokens issued elsewhere, whose lifetime is unknown.
    pub expires_at: Option<SystemTime>,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => SystemTime::now() + EXPIRY_SKEW >= expires_at,
            None => false,
        }
    }
}

/// Asks the person at the terminal for sign-in details.
pub trait CredentialPrompt: Send + Sync {
    fn username(&self, url: &str) -> anyhow::Result<String>;
    fn password(&self, username: &str) -> anyhow::Result<String>;
}

/// Terminal prompts via dialoguer.
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn username(&self, url: &str) -> anyhow::Result<String> {
        let username = dialoguer::Input::<String>::new()
            .with_prompt(format!("Username for {}", url))
            .interact_text()?;
        Ok(username)
    }

    fn password(&self, username: &str) -> anyhow::Result<String> {
        let password = dialoguer::Password::new()
            .with_prompt(format!("Password for {}", username))
            .interact()?;
        Ok(password)
    }
}

/// Obtains access tokens from the identity provider's token endpoint.
pub struct AuthManager {
    http_client: reqwest::Client,
    prompt: Box<dyn CredentialPrompt>,
}

impl AuthManager {
    pub fn new(prompt: Box<dyn CredentialPrompt>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            prompt,
        }
    }

    /// Manager that prompts on the terminal.
    pub fn interactive() -> Self {
        Self::new(Box::new(TerminalPrompt))
    }

    /// Acquire a token for the environment described by `settings`.
    pub async fn acquire(&self, settings: &ConnectionSettings) -> Result<TokenInfo> {
        let authority = settings
            .authority
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORITY);

        log::info!(
            "Authenticating to {} with {} credentials",
            settings.url,
            settings.credentials.kind()
        );

        match &settings.credentials {
            CredentialSet::AccessToken(token) => Ok(TokenInfo {
                access_token: token.clone(),
                expires_at: None,
            }),
            CredentialSet::UsernamePassword {
                username,
                password,
                client_id,
                client_secret,
                tenant_id,
            } => {
                let (username, password) = self.resolve_user(
                    &settings.url,
                    username.as_deref(),
                    password.as_deref(),
                    settings.login_prompt,
                )?;

                let token_url = token_endpoint(authority, tenant_id.as_deref().unwrap_or(DEFAULT_TENANT));
                let mut form = vec![
                    ("grant_type", "password"),
                    ("client_id", client_id.as_str()),
                    ("username", username.as_str()),
                    ("password", password.as_str()),
                    ("resource", settings.url.as_str()),
                ];
                if let Some(secret) = client_secret {
                    form.push(("client_secret", secret.as_str()));
                }

                self.request_token(&token_url, &form).await
            }
            CredentialSet::ClientCredentials {
                client_id,
                client_secret,
                tenant_id,
            } => {
                // An explicit Authority may already name the tenant
                let token_url = match (tenant_id.as_deref(), settings.authority.as_deref()) {
                    (Some(tenant), _) => token_endpoint(authority, tenant),
                    (None, Some(tenant_authority)) => {
                        format!("{}/oauth2/token", tenant_authority.trim_end_matches('/'))
                    }
                    (None, None) => {
                        return Err(Error::configuration(
                            "AuthType=ClientSecret requires TenantId or Authority",
                        ));
                    }
                };
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("resource", settings.url.as_str()),
                ];

                self.request_token(&token_url, &form).await
            }
        }
    }

    fn resolve_user(
        &self,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
        login_prompt: LoginPrompt,
    ) -> Result<(String, String)> {
        let prompt_failed = |e: anyhow::Error| Error::authentication(format!("Sign-in prompt failed: {}", e));

        let username = match (username, login_prompt) {
            (Some(u), _) => u.to_string(),
            (None, LoginPrompt::Never) => {
                return Err(Error::authentication(
                    "No Username in connection string and LoginPrompt=Never",
                ));
            }
            (None, _) => self.prompt.username(url).map_err(prompt_failed)?,
        };

        let password = match (password, login_prompt) {
            (_, LoginPrompt::Always) => self.prompt.password(&username).map_err(prompt_failed)?,
            (Some(p), _) => p.to_string(),
            (None, LoginPrompt::Never) => {
                return Err(Error::authentication(
                    "No Password in connection string and LoginPrompt=Never",
                ));
            }
            (None, LoginPrompt::Auto) => self.prompt.password(&username).map_err(prompt_failed)?,
        };

        Ok((username, password))
    }

    async fn request_token(&self, token_url: &str, form: &[(&str, &str)]) -> Result<TokenInfo> {
        let response = self
            .http_client
            .post(token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::authentication(format!("Token request to {} failed: {}", token_url, e)))?;

        let status = response.status();
        log::debug!("Token request status: {}", status);

        let text = response
            .text()
            .await
            .map_err(|e| Error::authentication(format!("Failed to read token response: {}", e)))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let description = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|d| d.as_str())
                .map(|d| d.to_string())
                .unwrap_or(text);
            return Err(Error::authentication(format!(
                "Token request failed with {}: {}",
                status, description
            )));
        }

        let access_token = body
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::authentication("No access token in response"))?;

        // v1 endpoints send expires_in as a string
        let expires_in = body
            .get("expires_in")
            .and_then(|e| e.as_u64().or_else(|| e.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(DEFAULT_EXPIRES_IN);

        log::info!("Token acquired, valid for {}s", expires_in);
        Ok(TokenInfo {
            access_token: access_token.to_string(),
            expires_at: Some(SystemTime::now() + Duration::from_secs(expires_in)),
        })
    }
}

fn token_endpoint(authority: &str, tenant: &str) -> String {
    format!("{}/{}/oauth2/token", authority.trim_end_matches('/'), tenant)
}
