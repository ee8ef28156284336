//! Configuration file handling
//!
//! Loads the TOML configuration and validates it into a [`RuntimeConfig`].

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "SF_DOC_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_FILE: &str = "sf-odata-doc.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Raw configuration as written in the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub entities: Vec<String>,
    pub paths: PathsConfig,
    pub template: TemplateConfig,
    pub http: HttpConfig,
}

/// Credential settings, tried in order: assertion, bearer token, basic auth
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub company_id: Option<String>,
    pub token_url: Option<String>,
    pub idp_url: Option<String>,
    pub private_key: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// API host, e.g. "api44.sapsf.com"
    pub api_server: String,
    pub scheme: String,
    /// Extra URL template tokens, e.g. `"{userId}" = "100042"`
    pub placeholders: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_server: String::new(),
            scheme: "https".to_string(),
            placeholders: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub template: PathBuf,
    pub dictionary_output: PathBuf,
    pub report_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("2.SF Query Integration Standard API TemplateV1.xlsx"),
            dictionary_output: PathBuf::from("3.SF EC Field API Attribute.xlsx"),
            report_output: PathBuf::from("SF_API_Documentation_Generated.xlsx"),
        }
    }
}

/// Sheet names and row filters inside the template workbook
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub master_sheet: String,
    pub template_sheet: String,
    pub system_filter: String,
    pub category_filter: String,
    pub schema_namespace: String,
    pub reference_sheets: Vec<ReferenceSheetConfig>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            master_sheet: "SF Master Table List".to_string(),
            template_sheet: "API Template".to_string(),
            system_filter: "SuccessFactors".to_string(),
            category_filter: "API Resource".to_string(),
            schema_namespace: "SFOData".to_string(),
            reference_sheets: vec![
                ReferenceSheetConfig {
                    name: "SF Master Data Dictionary".to_string(),
                    entity_column: "Entity".to_string(),
                    key_column: "Field".to_string(),
                },
                ReferenceSheetConfig {
                    name: "SF DropdownList Mapping".to_string(),
                    entity_column: "Entity".to_string(),
                    key_column: "Name".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceSheetConfig {
    pub name: String,
    pub entity_column: String,
    pub key_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub insecure_ssl: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            // Large $metadata documents are slow to download
            timeout_secs: 120,
            insecure_ssl: false,
        }
    }
}

/// Validated configuration used by the pipeline
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub auth: AuthConfig,
    pub api_server: String,
    pub scheme: String,
    pub placeholders: BTreeMap<String, String>,
    pub entities: Vec<String>,
    pub paths: PathsConfig,
    pub template: TemplateConfig,
    pub timeout: Duration,
    pub insecure_ssl: bool,
}

impl RuntimeConfig {
    /// Service root for OData v2 calls, with trailing slash
    pub fn odata_base_url(&self) -> String {
        format!("{}://{}/odata/v2/", self.scheme, self.api_server)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `$SF_DOC_CONFIG`, falling back to `sf-odata-doc.toml`
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        tracing::info!("Loading configuration from {}", path.display());
        Self::load(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Secrets may be supplied through the environment instead of the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut Option<String>); 4] = [
            ("SF_PRIVATE_KEY", &mut self.auth.private_key),
            ("SF_BEARER_TOKEN", &mut self.auth.bearer_token),
            ("SF_USERNAME", &mut self.auth.username),
            ("SF_PASSWORD", &mut self.auth.password),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(value);
            }
        }
    }

    /// Validate and convert into a [`RuntimeConfig`]
    pub fn to_runtime(&self) -> Result<RuntimeConfig, ConfigError> {
        let api_server = self.server.api_server.trim().to_string();
        if api_server.is_empty() {
            return Err(ConfigError::Invalid("server.api_server is required".to_string()));
        }

        let entities: Vec<String> = self
            .entities
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if entities.is_empty() {
            return Err(ConfigError::Invalid(
                "entities must list at least one entity".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let mut auth = self.auth.clone();
        if auth.private_key.is_none() {
            if let Some(ref key_path) = auth.private_key_path {
                let key = std::fs::read_to_string(key_path).map_err(|source| ConfigError::Io {
                    path: key_path.clone(),
                    source,
                })?;
                auth.private_key = Some(key.trim().to_string());
            }
        }

        Ok(RuntimeConfig {
            auth,
            api_server,
            scheme: self.server.scheme.clone(),
            placeholders: self.server.placeholders.clone(),
            entities,
            paths: self.paths.clone(),
            template: self.template.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            insecure_ssl: self.http.insecure_ssl,
        })
    }
}
