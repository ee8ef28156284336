//! Endpoint list parsing and execution
//!
//! Reads the master endpoint list of the template workbook, resolves URL
//! placeholders and queries each endpoint once.

use crate::auth::CredentialChain;
use crate::config::RuntimeConfig;
use crate::odata::ODataClient;
use crate::report::Sheet;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;

/// Master list columns (0-based)
mod column {
    pub const API_NAME: usize = 1;
    pub const ENTITY: usize = 2;
    pub const INTRODUCTION: usize = 4;
    pub const ENDPOINT: usize = 5;
    pub const TRIGGER_POINT: usize = 8;
    pub const DATA_FLOW: usize = 9;
    pub const SYSTEM: usize = 13;
    pub const CATEGORY: usize = 14;
}

/// One row of the master endpoint list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointSpec {
    /// 0-based row in the master sheet
    pub row: usize,
    pub api_name: String,
    pub entity: String,
    pub introduction: String,
    pub url_template: String,
    pub trigger_point: String,
    pub data_flow: String,
    pub system: String,
    pub category: String,
}

impl EndpointSpec {
    /// Name used for the report tab
    pub fn title(&self) -> &str {
        if self.api_name.is_empty() {
            &self.entity
        } else {
            &self.api_name
        }
    }
}

/// Rows must carry this system and category tag to be queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFilter {
    pub system: String,
    pub category: String,
}

impl Default for EndpointFilter {
    fn default() -> Self {
        Self {
            system: "SuccessFactors".to_string(),
            category: "API Resource".to_string(),
        }
    }
}

/// Read endpoint specs below the header row of the master sheet
pub fn read_endpoint_specs(sheet: &Sheet, filter: &EndpointFilter) -> Vec<EndpointSpec> {
    // Excel may store ids and names as numbers
    let text = |row: usize, col: usize| sheet.display_text(row, col).unwrap_or_default();

    let specs: Vec<EndpointSpec> = (1..sheet.row_count())
        .filter(|&row| {
            text(row, column::SYSTEM) == filter.system && text(row, column::CATEGORY) == filter.category
        })
        .map(|row| EndpointSpec {
            row,
            api_name: text(row, column::API_NAME),
            entity: text(row, column::ENTITY),
            introduction: text(row, column::INTRODUCTION),
            url_template: text(row, column::ENDPOINT),
            trigger_point: text(row, column::TRIGGER_POINT),
            data_flow: text(row, column::DATA_FLOW),
            system: text(row, column::SYSTEM),
            category: text(row, column::CATEGORY),
        })
        .filter(|spec| !spec.entity.is_empty() && !spec.url_template.is_empty())
        .collect();

    tracing::info!("Found {} endpoints in {}", specs.len(), sheet.name());
    specs
}

/// Substitutes placeholder tokens in URL templates
#[derive(Debug, Clone)]
pub struct UrlResolver {
    replacements: Vec<(String, String)>,
}

impl UrlResolver {
    pub fn new(api_server: &str, today: NaiveDate, extra: &BTreeMap<String, String>) -> Self {
        let mut replacements = vec![
            ("{{Test_API-Server}}".to_string(), api_server.to_string()),
            ("{Test_API-Server}".to_string(), api_server.to_string()),
            ("{today}".to_string(), today.format("%Y-%m-%d").to_string()),
        ];
        replacements.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        // Longest token first so "{{x}}" is not consumed as "{x}"
        replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { replacements }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(&config.api_server, Local::now().date_naive(), &config.placeholders)
    }

    pub fn resolve(&self, template: &str) -> String {
        self.replacements
            .iter()
            .fold(template.to_string(), |url, (token, value)| url.replace(token, value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointOutcome {
    Response(Value),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResult {
    pub spec: EndpointSpec,
    pub url: String,
    pub outcome: EndpointOutcome,
}

impl EndpointResult {
    pub fn response(&self) -> Option<&Value> {
        match &self.outcome {
            EndpointOutcome::Response(value) => Some(value),
            EndpointOutcome::Failed(_) => None,
        }
    }
}

/// Query every endpoint in order; a failure only affects its own result
pub async fn run_endpoints(
    client: &ODataClient,
    specs: &[EndpointSpec],
    resolver: &UrlResolver,
    credentials: &CredentialChain,
) -> Vec<EndpointResult> {
    let mut results = Vec::with_capacity(specs.len());

    for spec in specs {
        let url = resolver.resolve(&spec.url_template);
        tracing::info!("Processing {} ({})...", spec.entity, spec.title());

        let outcome = match client.get_json(&url, credentials).await {
            Ok(value) => EndpointOutcome::Response(value),
            Err(e) => {
                tracing::warn!("Error querying {}: {}", spec.entity, e);
                EndpointOutcome::Failed(e.to_string())
            }
        };

        results.push(EndpointResult {
            spec: spec.clone(),
            url,
            outcome,
        });
    }

    let failed = results.iter().filter(|r| r.response().is_none()).count();
    tracing::info!("Queried {} endpoints, {} failed", results.len(), failed);
    results
}
