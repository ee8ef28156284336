//! Worksheet tab naming
//!
//! Excel limits tab names to 31 characters, forbids `[]:*?/\` and compares
//! names case-insensitively. Distinct API names that collide after
//! truncation get a `~2`, `~3`, ... suffix.

use std::collections::{HashMap, HashSet};

pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Make a string usable as a tab name
pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let truncated: String = cleaned
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    // Excel rejects names that start or end with an apostrophe
    let trimmed = truncated.trim_matches('\'');
    if trimmed.is_empty() {
        "Sheet".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `base` cut short enough to carry `suffix`, never ending in an apostrophe
fn with_suffix(base: &str, suffix: &str) -> String {
    let stem: String = base
        .chars()
        .take(MAX_SHEET_NAME_LEN - suffix.len())
        .collect();
    format!("{}{}", stem.trim_end_matches('\''), suffix)
}

/// Assigns unique tab names to API names for one run
#[derive(Debug, Default)]
pub struct SheetNamer {
    reserved: HashSet<String>,
    taken: HashSet<String>,
    by_source: HashMap<String, String>,
}

impl SheetNamer {
    /// `reserved` names are never handed out (template and reference sheets)
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reserved: reserved.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
            ..Default::default()
        }
    }

    fn is_free(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        !self.reserved.contains(&key) && !self.taken.contains(&key)
    }

    /// Tab name for `source`; the same source always gets the same name
    pub fn assign(&mut self, source: &str) -> String {
        if let Some(name) = self.by_source.get(source) {
            return name.clone();
        }

        let base = sanitize_sheet_name(source);
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.is_free(&candidate) {
            candidate = with_suffix(&base, &format!("~{}", n));
            n += 1;
        }

        if candidate != base {
            tracing::warn!(
                "Sheet name {} already used, writing {} to {}",
                base,
                source,
                candidate
            );
        }

        self.taken.insert(candidate.to_lowercase());
        self.by_source.insert(source.to_string(), candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Sheet, Workbook};

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_sheet_name("User [v2]: all/any?"), "User _v2__ all_any_");
        assert_eq!(sanitize_sheet_name("  'quoted'  "), "quoted");
        assert_eq!(sanitize_sheet_name(""), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), MAX_SHEET_NAME_LEN);
    }

    #[test]
    fn test_truncation_collision_gets_suffix() {
        let long_a = "Query Employee Job Information History A";
        let long_b = "Query Employee Job Information History B";
        let mut namer = SheetNamer::new(Vec::<String>::new());

        let a = namer.assign(long_a);
        let b = namer.assign(long_b);
        assert_eq!(a, "Query Employee Job Information ");
        assert_eq!(b, "Query Employee Job Informatio~2");
        assert!(b.chars().count() <= MAX_SHEET_NAME_LEN);
        assert_ne!(a, b);

        // Same source keeps its tab
        assert_eq!(namer.assign(long_a), a);
        assert_eq!(namer.assign("Query Employee Job Information History C"), "Query Employee Job Informatio~3");
    }

    #[test]
    fn test_truncation_never_leaves_edge_apostrophe() {
        let name = sanitize_sheet_name("Query Direct Reports of Employ's Manager");
        assert_eq!(name, "Query Direct Reports of Employ");
        assert_eq!(sanitize_sheet_name("'''"), "Sheet");

        let mut namer = SheetNamer::new(Vec::<String>::new());
        assert_eq!(namer.assign("Query Direct Reports of Employ's Manager"), name);
        assert_eq!(namer.assign("Query Direct Reports of Employ'x"), "Query Direct Reports of Emplo~2");

        // Stem cut lands right after the apostrophe
        assert_eq!(namer.assign("Query Direct Reports of Empl'oyee"), "Query Direct Reports of Empl'oy");
        assert_eq!(namer.assign("Query Direct Reports of Empl'oyz"), "Query Direct Reports of Empl~2");
    }

    #[test]
    fn test_assigned_names_save() {
        let sources = [
            "Query Direct Reports of Employ's Manager",
            "Query Direct Reports of Employ'x",
            "Query Direct Reports of Empl'oyee",
            "Query Direct Reports of Empl'oyz",
            "'Quoted API'",
            "User [v2]: all/any?",
            "API Template",
            "",
        ];
        let mut namer = SheetNamer::new(["API Template"]);
        let mut workbook = Workbook::new();
        for source in sources {
            let mut sheet = Sheet::new(namer.assign(source));
            sheet.set(0, 0, source);
            workbook.upsert_sheet(sheet);
        }
        assert_eq!(workbook.sheets().len(), sources.len());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.xlsx");
        workbook.save(&path).unwrap();

        let loaded = Workbook::load(&path).unwrap();
        assert_eq!(loaded.sheet_names(), workbook.sheet_names());
    }

    #[test]
    fn test_reserved_names_avoided() {
        let mut namer = SheetNamer::new(["API Template", "SF Master Table List"]);
        assert_eq!(namer.assign("api template"), "api template~2");
        assert_eq!(namer.assign("User"), "User");
        assert_eq!(namer.assign("USER"), "USER~2");
    }
}
