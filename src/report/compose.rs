//! Per-endpoint report sheets
//!
//! Each endpoint result becomes a copy of the template sheet holding its
//! header metadata, a sample response and one row per flattened field.

use crate::config::TemplateConfig;
use crate::endpoints::{EndpointOutcome, EndpointResult};
use crate::flatten::{limit_sample, FlattenedField, Flattener, SAMPLE_ARRAY_LIMIT};
use crate::odata::{FieldAttribute, SchemaDictionary};
use crate::report::cleanup::ReferencedFields;
use crate::report::sheet_name::SheetNamer;
use crate::report::workbook::{truncate_chars, CellValue, ReportError, Sheet, Workbook, MAX_CELL_CHARS};
use serde::Serialize;
use serde_json::Value;

/// Template cell positions, 0-based (row, col)
mod cell {
    pub const API_NAME: (usize, usize) = (0, 0); // A1
    pub const DATA_FLOW: (usize, usize) = (1, 1); // B2
    pub const TRIGGER_POINT: (usize, usize) = (2, 1); // B3
    pub const ENTITY: (usize, usize) = (3, 1); // B4
    pub const INTRODUCTION: (usize, usize) = (4, 1); // B5
    pub const ENDPOINT: (usize, usize) = (5, 1); // B6
    pub const SAMPLE_RESPONSE: (usize, usize) = (11, 1); // B12
    /// Column L of the master list
    pub const MASTER_SAMPLE_COL: usize = 11;
    /// First field row (row 14)
    pub const FIELD_START_ROW: usize = 13;
}

/// Field table columns, 0-based
mod column {
    pub const FIELD: usize = 1;
    pub const ENTITY: usize = 2;
    pub const PATH: usize = 3;
    pub const SAMPLE: usize = 4;
    pub const LABEL: usize = 5;
    pub const TYPE: usize = 6;
    pub const KEY: usize = 7;
    pub const REQUIRED: usize = 8;
    pub const PICKLIST: usize = 9;
    pub const MAX_LENGTH: usize = 10;
}

/// A loaded template workbook with its required sheets verified
#[derive(Debug, Clone)]
pub struct ReportTemplate {
    workbook: Workbook,
    layout: TemplateConfig,
    template_sheet: Sheet,
}

impl ReportTemplate {
    pub fn new(workbook: Workbook, layout: TemplateConfig) -> Result<Self, ReportError> {
        if !workbook.contains(&layout.master_sheet) {
            return Err(ReportError::MissingSheet(layout.master_sheet.clone()));
        }
        let template_sheet = workbook
            .sheet(&layout.template_sheet)
            .cloned()
            .ok_or_else(|| ReportError::MissingSheet(layout.template_sheet.clone()))?;

        Ok(Self {
            workbook,
            layout,
            template_sheet,
        })
    }

    pub fn master_sheet(&self) -> &Sheet {
        self.workbook
            .sheet(&self.layout.master_sheet)
            .unwrap_or(&self.template_sheet)
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    fn reserved_names(&self) -> Vec<String> {
        let mut names = vec![
            self.layout.template_sheet.clone(),
            self.layout.master_sheet.clone(),
        ];
        names.extend(self.layout.reference_sheets.iter().map(|s| s.name.clone()));
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub sheet: String,
    pub api_name: String,
    pub fields: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ComposeSummary {
    pub sheets: Vec<SheetSummary>,
    pub referenced: ReferencedFields,
}

/// Pretty-print with 4-space indent, arrays capped at the sample limit
fn sample_json(value: &Value) -> String {
    let limited = limit_sample(value, SAMPLE_ARRAY_LIMIT);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match limited.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => limited.to_string(),
    }
}

fn cell_text(text: &str) -> CellValue {
    CellValue::from(truncate_chars(text, MAX_CELL_CHARS))
}

fn flag_text(value: Option<bool>) -> String {
    value.map(|b| b.to_string()).unwrap_or_default()
}

fn write_field_row(sheet: &mut Sheet, row: usize, field: &FlattenedField, meta: Option<&FieldAttribute>) {
    sheet.set(row, column::FIELD, field.name.as_str());
    sheet.set(row, column::ENTITY, field.entity.clone().unwrap_or_default());
    sheet.set(row, column::PATH, field.path.as_str());
    sheet.set(row, column::SAMPLE, cell_text(field.sample.as_deref().unwrap_or_default()));

    let Some(meta) = meta else {
        return;
    };
    sheet.set(row, column::LABEL, meta.label.clone().unwrap_or_default());
    sheet.set(row, column::TYPE, meta.data_type.clone().unwrap_or_default());
    sheet.set(row, column::KEY, meta.key.to_string());
    sheet.set(row, column::REQUIRED, flag_text(meta.required));
    sheet.set(row, column::PICKLIST, meta.picklist.clone().unwrap_or_default());
    sheet.set(row, column::MAX_LENGTH, meta.max_length.clone().unwrap_or_default());
}

/// Write one sheet per endpoint result into the template workbook
pub fn compose(
    template: &mut ReportTemplate,
    results: &[EndpointResult],
    dictionary: &SchemaDictionary,
) -> ComposeSummary {
    let mut namer = SheetNamer::new(template.reserved_names());
    let mut summary = ComposeSummary::default();

    for result in results {
        let spec = &result.spec;
        let sheet_name = namer.assign(spec.title());

        let (sample, fields) = match &result.outcome {
            EndpointOutcome::Response(value) => {
                let fields = Flattener::new()
                    .root_entity(spec.entity.as_str())
                    .skip_key("__metadata")
                    .flatten(value);
                (sample_json(value), fields)
            }
            EndpointOutcome::Failed(message) => (format!("ERROR: {}", message), Vec::new()),
        };

        let mut sheet = template.template_sheet.clone();
        sheet.set_name(sheet_name.as_str());

        let (r, c) = cell::API_NAME;
        sheet.set(r, c, spec.api_name.as_str());
        let (r, c) = cell::DATA_FLOW;
        sheet.set(r, c, spec.data_flow.as_str());
        let (r, c) = cell::TRIGGER_POINT;
        sheet.set(r, c, spec.trigger_point.as_str());
        let (r, c) = cell::ENTITY;
        sheet.set(r, c, spec.entity.as_str());
        let (r, c) = cell::INTRODUCTION;
        sheet.set(r, c, spec.introduction.as_str());
        let (r, c) = cell::ENDPOINT;
        sheet.set(r, c, result.url.as_str());
        let (r, c) = cell::SAMPLE_RESPONSE;
        sheet.set(r, c, cell_text(&sample));

        let mut matched = 0;
        for (i, field) in fields.iter().enumerate() {
            let meta = dictionary.lookup(field.entity.as_deref(), &field.name);
            write_field_row(&mut sheet, cell::FIELD_START_ROW + i, field, meta);

            summary
                .referenced
                .insert(field.entity.as_deref().unwrap_or_default(), &field.name);
            if let Some(meta) = meta {
                summary.referenced.insert(&meta.entity, &meta.name);
                matched += 1;
            }
        }

        if let Some(master) = template.workbook.sheet_mut(&template.layout.master_sheet) {
            master.set(spec.row, cell::MASTER_SAMPLE_COL, cell_text(&sample));
        }

        tracing::info!(
            "Created sheet: {} ({} fields, {} matched)",
            sheet_name,
            fields.len(),
            matched
        );
        template.workbook.upsert_sheet(sheet);
        summary.sheets.push(SheetSummary {
            sheet: sheet_name,
            api_name: spec.title().to_string(),
            fields: fields.len(),
            matched,
        });
    }

    summary
}
