//! End-to-end documentation run
//!
//! Template checks happen before any network activity. After
//! authentication succeeds, per-item failures only leave gaps and the
//! report is always written.

use crate::auth::authenticate;
use crate::config::RuntimeConfig;
use crate::endpoints::{read_endpoint_specs, run_endpoints, EndpointFilter, UrlResolver};
use crate::odata::{build_http_client, extract_schema, ODataClient};
use crate::report::{cleanup, compose, ReportError, ReportTemplate, Workbook};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Counts reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub dictionary_fields: usize,
    pub endpoints: usize,
    pub failed_endpoints: usize,
    pub sheets: Vec<String>,
    pub report_path: PathBuf,
}

fn ensure_output_dir(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(ReportError::OutputDirMissing(dir.to_path_buf()))
        }
        _ => Ok(()),
    }
}

pub async fn run(config: &RuntimeConfig) -> anyhow::Result<RunSummary> {
    let paths = &config.paths;
    ensure_output_dir(&paths.dictionary_output)?;
    ensure_output_dir(&paths.report_output)?;

    let workbook = Workbook::load(&paths.template)
        .with_context(|| format!("loading template {}", paths.template.display()))?;
    let mut template = ReportTemplate::new(workbook, config.template.clone())?;

    let filter = EndpointFilter {
        system: config.template.system_filter.clone(),
        category: config.template.category_filter.clone(),
    };
    let specs = read_endpoint_specs(template.master_sheet(), &filter);

    let http_client = build_http_client(config.timeout, config.insecure_ssl)?;
    let credentials = authenticate(&config.auth, &http_client).await?;
    tracing::info!("Authenticating with {}", credentials.describe());

    let client = ODataClient::new(http_client, config.odata_base_url());
    tracing::info!("OData service root: {}", client.endpoint());
    let namespace = Some(config.template.schema_namespace.as_str()).filter(|ns| !ns.is_empty());
    let dictionary = extract_schema(&client, &config.entities, &credentials, namespace).await;
    match dictionary.to_workbook().save(&paths.dictionary_output) {
        Ok(()) => tracing::info!("Dictionary saved to {}", paths.dictionary_output.display()),
        Err(e) => tracing::error!("Failed to save dictionary: {}", e),
    }

    let resolver = UrlResolver::from_config(config);
    let results = run_endpoints(&client, &specs, &resolver, &credentials).await;

    let composed = compose(&mut template, &results, &dictionary);
    let mut workbook = template.into_workbook();
    cleanup(&mut workbook, &config.template.reference_sheets, &composed.referenced);

    workbook
        .save(&paths.report_output)
        .with_context(|| format!("saving report {}", paths.report_output.display()))?;
    tracing::info!("Documentation generated: {}", paths.report_output.display());

    Ok(RunSummary {
        dictionary_fields: dictionary.len(),
        endpoints: results.len(),
        failed_endpoints: results.iter().filter(|r| r.response().is_none()).count(),
        sheets: composed.sheets.into_iter().map(|s| s.sheet).collect(),
        report_path: paths.report_output.clone(),
    })
}
