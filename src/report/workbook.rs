//! In-memory workbook with xlsx load/save
//!
//! Templates are read with calamine and written back with rust_xlsxwriter.
//! Only cell values survive the round trip; formatting is not carried.

use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum characters an xlsx cell can hold
pub const MAX_CELL_CHARS: usize = 32_767;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Spreadsheet errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Template file not found: {0}")]
    NotFound(PathBuf),

    #[error("Output directory does not exist: {0}")]
    OutputDirMissing(PathBuf),

    #[error("Failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Sheet not found in workbook: {0}")]
    MissingSheet(String),

    #[error("Cell ({row}, {col}) of sheet {sheet} is outside the xlsx grid")]
    OutOfBounds { sheet: String, row: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::String(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            other => CellValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::String(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::String).unwrap_or_default()
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// One worksheet as a sparse-tailed grid of rows, 0-based
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Trimmed text of a string cell, `None` when blank
    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.get(row, col)
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Trimmed display form of any non-blank cell, numbers included
    pub fn display_text(&self, row: usize, col: usize) -> Option<String> {
        let text = self.get(row, col).to_string();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<CellValue>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, CellValue::default);
        }
        cells[col] = value.into();
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    /// Replace all rows at once
    pub fn set_rows(&mut self, rows: Vec<Vec<CellValue>>) {
        self.rows = rows;
    }
}

/// Ordered collection of sheets; names compare case-insensitively like Excel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| same_name(s.name(), name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| same_name(s.name(), name))
    }

    /// Insert a sheet, replacing one of the same name in place
    pub fn upsert_sheet(&mut self, sheet: Sheet) {
        match self.sheets.iter_mut().find(|s| same_name(s.name(), sheet.name())) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    /// Read every sheet of an xlsx file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }

        let mut xlsx: Xlsx<_> = open_workbook(path)?;
        let mut workbook = Workbook::new();

        for name in xlsx.sheet_names() {
            let range = xlsx.worksheet_range(&name)?;
            let (row0, col0) = range.start().unwrap_or((0, 0));
            let mut sheet = Sheet::new(name);
            for (r, cells) in range.rows().enumerate() {
                for (c, cell) in cells.iter().enumerate() {
                    let value = CellValue::from_data(cell);
                    if !value.is_empty() {
                        sheet.set(row0 as usize + r, col0 as usize + c, value);
                    }
                }
            }
            workbook.sheets.push(sheet);
        }

        tracing::debug!(
            "Loaded workbook {} with sheets: {:?}",
            path.display(),
            workbook.sheet_names()
        );
        Ok(workbook)
    }

    /// Write every sheet to an xlsx file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let mut output = rust_xlsxwriter::Workbook::new();

        for sheet in &self.sheets {
            let worksheet = output.add_worksheet();
            worksheet.set_name(sheet.name())?;

            for (r, cells) in sheet.rows().iter().enumerate() {
                for (c, cell) in cells.iter().enumerate() {
                    if cell.is_empty() {
                        continue;
                    }
                    if r >= MAX_ROWS || c >= MAX_COLS {
                        return Err(ReportError::OutOfBounds {
                            sheet: sheet.name().to_string(),
                            row: r,
                            col: c,
                        });
                    }
                    let (row, col) = (r as u32, c as u16);
                    match cell {
                        CellValue::Empty => {}
                        CellValue::String(s) => {
                            worksheet.write_string(row, col, truncate_chars(s, MAX_CELL_CHARS))?;
                        }
                        CellValue::Number(n) => {
                            worksheet.write_number(row, col, *n)?;
                        }
                        CellValue::Bool(b) => {
                            worksheet.write_boolean(row, col, *b)?;
                        }
                    }
                }
            }
        }

        output.save(path)?;
        tracing::info!("Workbook saved to {}", path.display());
        Ok(())
    }
}

/// Cut a string to at most `max` characters
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_grows_grid() {
        let mut sheet = Sheet::new("Data");
        sheet.set(2, 3, "x");
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.get(2, 3), &CellValue::from("x"));
        assert_eq!(sheet.get(0, 0), &CellValue::Empty);
        assert_eq!(sheet.get(10, 10), &CellValue::Empty);
        assert_eq!(sheet.text(2, 3), Some("x"));
    }

    #[test]
    fn test_text_trims_and_skips_blank() {
        let mut sheet = Sheet::new("Data");
        sheet.set(0, 0, "  padded ");
        sheet.set(0, 1, "   ");
        sheet.set(0, 2, 4.0);
        assert_eq!(sheet.text(0, 0), Some("padded"));
        assert_eq!(sheet.text(0, 1), None);
        assert_eq!(sheet.text(0, 2), None);
        assert_eq!(sheet.display_text(0, 2), Some("4".to_string()));
        assert_eq!(sheet.display_text(0, 0), Some("padded".to_string()));
        assert_eq!(sheet.display_text(0, 1), None);
        assert_eq!(sheet.display_text(5, 5), None);
    }

    #[test]
    fn test_sheet_names_case_insensitive() {
        let mut workbook = Workbook::new();
        workbook.upsert_sheet(Sheet::new("API Template"));
        assert!(workbook.contains("api template"));

        let mut replacement = Sheet::new("API TEMPLATE");
        replacement.set(0, 0, "new");
        workbook.upsert_sheet(replacement);
        assert_eq!(workbook.sheets().len(), 1);
        assert_eq!(workbook.sheet("API Template").unwrap().text(0, 0), Some("new"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut first = Sheet::new("First");
        first.set(0, 0, "name");
        first.set(1, 0, "userId");
        first.set(1, 1, 42.0);
        first.set(1, 2, true);
        let mut second = Sheet::new("Second");
        second.set(3, 2, "offset");

        let mut workbook = Workbook::new();
        workbook.upsert_sheet(first);
        workbook.upsert_sheet(second);
        workbook.save(&path).unwrap();

        let loaded = Workbook::load(&path).unwrap();
        assert_eq!(loaded.sheet_names(), vec!["First", "Second"]);
        let first = loaded.sheet("First").unwrap();
        assert_eq!(first.text(1, 0), Some("userId"));
        assert_eq!(first.get(1, 1), &CellValue::Number(42.0));
        assert_eq!(first.get(1, 2), &CellValue::Bool(true));
        assert_eq!(loaded.sheet("Second").unwrap().text(3, 2), Some("offset"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Workbook::load("/nonexistent/template.xlsx").unwrap_err();
        assert!(matches!(err, ReportError::NotFound(_)));
    }
}
