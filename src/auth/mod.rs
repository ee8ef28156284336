//! SuccessFactors authentication module
//!
//! Implements the OAuth2 SAML bearer assertion flow. A statically configured
//! bearer token and basic authentication follow it in the credential chain,
//! used when the assertion exchange fails or the server rejects a token.

use crate::config::AuthConfig;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;

const SAML_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:saml2-bearer";

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Assertion generation failed: {0}")]
    Assertion(String),

    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token parse error: {0}")]
    ParseError(String),

    #[error("All authentication strategies failed; last error: {0}")]
    Exhausted(String),
}

/// Token response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Which strategy produced a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Assertion,
    Static,
}

/// Credential attached to every OData request
#[derive(Debug, Clone)]
pub enum Credential {
    Bearer {
        access_token: String,
        expires_at: Option<Instant>,
        source: TokenSource,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl Credential {
    /// Consider a token expired 60 seconds before actual expiry
    pub fn is_valid(&self) -> bool {
        match self {
            Credential::Bearer {
                expires_at: Some(expires_at),
                ..
            } => *expires_at > Instant::now() + Duration::from_secs(60),
            _ => true,
        }
    }

    /// Short description for logs, never includes the secret
    pub fn describe(&self) -> &'static str {
        match self {
            Credential::Bearer {
                source: TokenSource::Assertion,
                ..
            } => "OAuth bearer token (SAML assertion)",
            Credential::Bearer {
                source: TokenSource::Static,
                ..
            } => "configured bearer token",
            Credential::Basic { .. } => "basic authentication",
        }
    }

    /// Attach the credential to a request
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Bearer { access_token, .. } => request.bearer_auth(access_token),
            Credential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

/// Usable credentials in fallback order
///
/// Requests start with the first valid credential and move to the next one
/// when the server rejects it with 401 or 403.
#[derive(Debug, Clone, Default)]
pub struct CredentialChain {
    credentials: Vec<Credential>,
}

impl CredentialChain {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    pub fn primary(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Credentials that have not expired, in order
    pub fn usable(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter().filter(|c| c.is_valid())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn describe(&self) -> String {
        self.credentials
            .iter()
            .map(Credential::describe)
            .collect::<Vec<_>>()
            .join(", then ")
    }
}

impl From<Credential> for CredentialChain {
    fn from(credential: Credential) -> Self {
        Self::new(vec![credential])
    }
}

/// Collect every available credential: assertion token, static bearer token, basic auth
pub async fn authenticate(config: &AuthConfig, http_client: &Client) -> Result<CredentialChain, AuthError> {
    let mut credentials = Vec::new();

    let assertion = match SamlBearerAuth::from_config(config, http_client.clone()) {
        Ok(auth) => auth.acquire_token().await,
        Err(e) => Err(e),
    };
    let assertion_error = match assertion {
        Ok(credential) => {
            credentials.push(credential);
            None
        }
        Err(e) => {
            tracing::warn!("{}. Will try fallback methods.", e);
            Some(e)
        }
    };

    if let Some(token) = non_empty(&config.bearer_token) {
        tracing::info!("Configured bearer token available");
        credentials.push(Credential::Bearer {
            access_token: token.to_string(),
            expires_at: None,
            source: TokenSource::Static,
        });
    }

    if let (Some(username), Some(password)) = (non_empty(&config.username), non_empty(&config.password)) {
        tracing::info!("Basic authentication available for user {}", username);
        credentials.push(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    match assertion_error {
        Some(e) if credentials.is_empty() => {
            tracing::error!("No bearer token or basic credentials configured");
            Err(AuthError::Exhausted(e.to_string()))
        }
        _ => Ok(CredentialChain::new(credentials)),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// SAML bearer assertion exchange against the SuccessFactors IdP and token endpoints
#[derive(Debug)]
pub struct SamlBearerAuth {
    client_id: String,
    user_id: String,
    company_id: String,
    token_url: String,
    idp_url: String,
    private_key: String,
    http_client: Client,
}

impl SamlBearerAuth {
    /// Build from config; every assertion setting must be present
    pub fn from_config(config: &AuthConfig, http_client: Client) -> Result<Self, AuthError> {
        let required = |value: &Option<String>, name: &str| {
            non_empty(value)
                .map(str::to_string)
                .ok_or_else(|| AuthError::Assertion(format!("missing auth.{}", name)))
        };

        Ok(Self {
            client_id: required(&config.client_id, "client_id")?,
            user_id: required(&config.user_id, "user_id")?,
            company_id: required(&config.company_id, "company_id")?,
            token_url: required(&config.token_url, "token_url")?,
            idp_url: required(&config.idp_url, "idp_url")?,
            private_key: required(&config.private_key, "private_key")?,
            http_client,
        })
    }

    /// Request a signed assertion from the IdP endpoint
    async fn generate_assertion(&self) -> Result<String, AuthError> {
        tracing::info!("Generating SAML assertion...");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("user_id", self.user_id.as_str()),
            ("token_url", self.token_url.as_str()),
            ("private_key", self.private_key.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.idp_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Assertion(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Assertion(format!("Status: {}, Body: {}", status, body)));
        }

        let assertion = response
            .text()
            .await
            .map_err(|e| AuthError::Assertion(e.to_string()))?;
        let assertion = assertion.trim();
        if assertion.is_empty() {
            return Err(AuthError::Assertion("IdP returned an empty assertion".to_string()));
        }
        Ok(assertion.to_string())
    }

    /// Exchange a fresh assertion for an access token
    pub async fn acquire_token(&self) -> Result<Credential, AuthError> {
        let assertion = self.generate_assertion().await?;

        tracing::info!("Getting access token...");
        let params = [
            ("company_id", self.company_id.as_str()),
            ("client_id", self.client_id.as_str()),
            ("grant_type", SAML_BEARER_GRANT),
            ("user_id", self.user_id.as_str()),
            ("assertion", assertion.as_str()),
            ("new_token", "true"),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token request failed: {} - {}", status, body);
            return Err(AuthError::TokenRequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        if token_response.access_token.trim().is_empty() {
            return Err(AuthError::ParseError("access_token is empty".to_string()));
        }

        match token_response.expires_in {
            Some(secs) => tracing::info!("Token acquired successfully, expires in {} seconds", secs),
            None => tracing::info!("Token acquired successfully"),
        }

        Ok(Credential::Bearer {
            access_token: token_response.access_token,
            expires_at: token_response
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
            source: TokenSource::Assertion,
        })
    }
}
