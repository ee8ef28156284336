//! Report module
//!
//! Spreadsheet model, per-endpoint sheet composition and reference cleanup

pub mod cleanup;
pub mod compose;
pub mod sheet_name;
pub mod workbook;

pub use cleanup::{cleanup, CleanupStats, ReferencedFields};
pub use compose::{compose, ComposeSummary, ReportTemplate, SheetSummary};
pub use sheet_name::{sanitize_sheet_name, SheetNamer, MAX_SHEET_NAME_LEN};
pub use workbook::{CellValue, ReportError, Sheet, Workbook};
