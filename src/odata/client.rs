//! OData Client module
//!
//! HTTP client for SuccessFactors OData v2 APIs

use crate::auth::CredentialChain;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// OData client errors
#[derive(Error, Debug)]
pub enum ODataError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unauthorized ({0}): {1}")]
    Unauthorized(u16, String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No usable credential left")]
    NoCredential,
}

/// Build the shared HTTP client
pub fn build_http_client(timeout: Duration, insecure_ssl: bool) -> Result<Client, ODataError> {
    let builder = Client::builder().timeout(timeout);
    let builder = if insecure_ssl {
        builder.danger_accept_invalid_certs(true)
    } else {
        builder
    };
    Ok(builder.build()?)
}

/// OData client for SuccessFactors APIs
#[derive(Debug, Clone)]
pub struct ODataClient {
    endpoint: String,
    http_client: Client,
}

impl ODataClient {
    /// Create a new OData client
    ///
    /// # Arguments
    /// * `http_client` - Shared reqwest client
    /// * `endpoint` - Service root URL (e.g., "https://api44.sapsf.com/odata/v2/")
    pub fn new(http_client: Client, endpoint: String) -> Self {
        // Ensure endpoint ends with /
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        };

        Self {
            endpoint,
            http_client,
        }
    }

    /// Get endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Map a response status onto the error taxonomy
    async fn check_status(response: Response) -> Result<Response, ODataError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(response),
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                Err(ODataError::NotFound(body))
            }
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                let body = response.text().await.unwrap_or_default();
                Err(ODataError::Unauthorized(status.as_u16(), body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ODataError::ServerError(status.as_u16(), body))
            }
        }
    }

    /// Send a GET with each usable credential until one is not rejected
    async fn get_authorized(
        &self,
        url: &str,
        accept: &str,
        credentials: &CredentialChain,
    ) -> Result<Response, ODataError> {
        let mut rejected = None;

        for credential in credentials.usable() {
            let request = self.http_client.get(url).header("Accept", accept);
            let response = credential.authorize(request).send().await?;
            match Self::check_status(response).await {
                Err(ODataError::Unauthorized(status, body)) => {
                    tracing::warn!(
                        "{} rejected with {} for {}, trying next credential",
                        credential.describe(),
                        status,
                        url
                    );
                    rejected = Some(ODataError::Unauthorized(status, body));
                }
                result => return result,
            }
        }

        Err(rejected.unwrap_or(ODataError::NoCredential))
    }

    /// Fetch the `$metadata` XML of one entity set
    pub async fn fetch_metadata(
        &self,
        entity: &str,
        credentials: &CredentialChain,
    ) -> Result<String, ODataError> {
        let url = format!("{}{}/$metadata", self.endpoint, entity);
        tracing::debug!("Fetching metadata: {}", url);

        let response = self.get_authorized(&url, "application/xml", credentials).await?;

        // Get response as bytes to handle large XML and encoding issues
        let bytes = response.bytes().await.map_err(|e| {
            ODataError::ParseError(format!("Failed to read metadata bytes: {}", e))
        })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// GET an absolute URL and parse the body as JSON
    pub async fn get_json(&self, url: &str, credentials: &CredentialChain) -> Result<Value, ODataError> {
        tracing::debug!("Fetching: {}", url);

        let response = self.get_authorized(url, "application/json", credentials).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            ODataError::ParseError(format!("Failed to parse OData response: {}", e))
        })
    }
}
