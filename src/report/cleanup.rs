//! Removal of reference rows not used by the current run

use crate::config::ReferenceSheetConfig;
use crate::report::workbook::{CellValue, Sheet, Workbook};
use std::collections::HashSet;

/// (entity, field) pairs referenced by the generated sheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencedFields {
    keys: HashSet<(String, String)>,
}

impl ReferencedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: &str, field: &str) {
        self.keys.insert((entity.trim().to_string(), field.trim().to_string()));
    }

    pub fn contains(&self, entity: &str, field: &str) -> bool {
        self.keys
            .contains(&(entity.trim().to_string(), field.trim().to_string()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub sheet: String,
    pub kept: usize,
    pub removed: usize,
}

fn header_index(header: &[CellValue], title: &str) -> Option<usize> {
    header
        .iter()
        .position(|cell| cell.as_str().map(str::trim) == Some(title))
}

/// Keep only the header and rows whose (entity, key) pair is referenced
///
/// Returns `None` and leaves the sheet untouched when a key column is missing.
pub fn cleanup_sheet(
    sheet: &mut Sheet,
    config: &ReferenceSheetConfig,
    referenced: &ReferencedFields,
) -> Option<CleanupStats> {
    let header = sheet.rows().first()?;
    let (entity_idx, key_idx) = match (
        header_index(header, &config.entity_column),
        header_index(header, &config.key_column),
    ) {
        (Some(e), Some(k)) => (e, k),
        _ => {
            tracing::warn!(
                "'{}' or '{}' column not found in {}",
                config.entity_column,
                config.key_column,
                config.name
            );
            return None;
        }
    };

    // Decide every row first, then rebuild
    let keep: Vec<bool> = sheet
        .rows()
        .iter()
        .skip(1)
        .map(|row| match (row.get(entity_idx), row.get(key_idx)) {
            (Some(entity), Some(key)) => referenced.contains(&entity.to_string(), &key.to_string()),
            _ => false,
        })
        .collect();

    let mut rows = sheet.rows().iter();
    let mut rebuilt: Vec<Vec<CellValue>> = rows.next().cloned().into_iter().collect();
    rebuilt.extend(
        rows.zip(&keep)
            .filter(|(_, keep)| **keep)
            .map(|(row, _)| row.clone()),
    );

    let kept = rebuilt.len() - 1;
    let removed = keep.len() - kept;
    sheet.set_rows(rebuilt);

    Some(CleanupStats {
        sheet: config.name.clone(),
        kept,
        removed,
    })
}

/// Clean every configured reference sheet present in the workbook
pub fn cleanup(
    workbook: &mut Workbook,
    sheets: &[ReferenceSheetConfig],
    referenced: &ReferencedFields,
) -> Vec<CleanupStats> {
    tracing::info!("Cleaning up unused fields in reference sheets...");
    let mut stats = Vec::new();

    for config in sheets {
        let Some(sheet) = workbook.sheet_mut(&config.name) else {
            tracing::debug!("Reference sheet {} not present, skipping", config.name);
            continue;
        };
        if let Some(result) = cleanup_sheet(sheet, config, referenced) {
            tracing::info!(
                "{} cleaned. Kept {} rows, removed {}.",
                result.sheet,
                result.kept,
                result.removed
            );
            stats.push(result);
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary_config() -> ReferenceSheetConfig {
        ReferenceSheetConfig {
            name: "SF Master Data Dictionary".to_string(),
            entity_column: "Entity".to_string(),
            key_column: "Field".to_string(),
        }
    }

    fn dictionary_sheet() -> Sheet {
        let mut sheet = Sheet::new("SF Master Data Dictionary");
        let rows = [
            ["Entity", "Field", "Description"],
            ["User", "userId", "id"],
            ["User", "firstName", "first"],
            ["EmpJob", "jobCode", "job"],
            ["User", "unused", "gone"],
        ];
        for row in rows {
            sheet.push_row(row.iter().map(|c| CellValue::from(*c)).collect());
        }
        sheet.push_row(vec![CellValue::from("User")]);
        sheet
    }

    fn referenced() -> ReferencedFields {
        let mut referenced = ReferencedFields::new();
        referenced.insert("User", "userId");
        referenced.insert("EmpJob", "jobCode");
        referenced.insert("User", "firstName");
        referenced
    }

    #[test]
    fn test_cleanup_keeps_referenced_rows() {
        let mut sheet = dictionary_sheet();
        let stats = cleanup_sheet(&mut sheet, &dictionary_config(), &referenced()).unwrap();

        assert_eq!(stats.kept, 3);
        assert_eq!(stats.removed, 2);
        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.text(0, 0), Some("Entity"));
        assert_eq!(sheet.text(1, 1), Some("userId"));
        assert_eq!(sheet.text(2, 1), Some("firstName"));
        assert_eq!(sheet.text(3, 1), Some("jobCode"));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut workbook = Workbook::new();
        workbook.upsert_sheet(dictionary_sheet());
        let configs = [dictionary_config()];

        cleanup(&mut workbook, &configs, &referenced());
        let once = workbook.clone();
        let stats = cleanup(&mut workbook, &configs, &referenced());

        assert_eq!(workbook, once);
        assert_eq!(stats[0].removed, 0);
        assert_eq!(workbook.sheet("SF Master Data Dictionary").unwrap().row_count(), 4);
    }

    #[test]
    fn test_missing_sheet_is_noop() {
        let mut workbook = Workbook::new();
        workbook.upsert_sheet(Sheet::new("Other"));
        let before = workbook.clone();

        let stats = cleanup(&mut workbook, &[dictionary_config()], &referenced());
        assert!(stats.is_empty());
        assert_eq!(workbook, before);
    }

    #[test]
    fn test_missing_key_column_leaves_sheet() {
        let mut sheet = dictionary_sheet();
        let before = sheet.clone();
        let config = ReferenceSheetConfig {
            key_column: "Name".to_string(),
            ..dictionary_config()
        };

        assert!(cleanup_sheet(&mut sheet, &config, &referenced()).is_none());
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_empty_referenced_set_keeps_header_only() {
        let mut sheet = dictionary_sheet();
        let stats = cleanup_sheet(&mut sheet, &dictionary_config(), &ReferencedFields::new()).unwrap();
        assert_eq!(stats.kept, 0);
        assert_eq!(sheet.row_count(), 1);
    }
}
