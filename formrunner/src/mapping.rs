use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{info, warn};

use crate::document::{normalize_cell, Document};
use crate::errors::{CellError, RunnerError};
use crate::store::DocumentStore;

/// Title → element identifier table.
///
/// Keys are either a plain title or `"{title}-{index}"` for rows processed
/// inside an index-aware subsequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    entries: HashMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a two-column sheet (title, identifier), skipping the header row.
    pub fn from_document(document: &Document) -> Result<Self, RunnerError> {
        if document.column_count() < 2 {
            return Err(RunnerError::MappingLoad(format!(
                "sheet '{}' needs two columns, found {}",
                document.sheet(),
                document.column_count()
            )));
        }

        let mut table = Self::new();
        for row in 1..document.row_count() {
            let key = normalize_cell(document.cell(row, 0));
            if key.is_empty() {
                continue;
            }
            let id = normalize_cell(document.cell(row, 1));
            if id.is_empty() {
                warn!(key = %key, row, "Mapping title has no identifier, skipping");
                continue;
            }
            if let Some(previous) = table.entries.insert(key.clone(), id) {
                warn!(key = %key, previous = %previous, "Duplicate mapping title, keeping the later entry");
            }
        }
        Ok(table)
    }

    /// Load through a store, turning any failure into a mapping-load error.
    pub fn load(store: &dyn DocumentStore, path: &Path, sheet: &str) -> Result<Self, RunnerError> {
        let document = store
            .load(path, sheet)
            .map_err(|e| RunnerError::MappingLoad(e.to_string()))?;
        let table = Self::from_document(&document)?;
        info!(path = %path.display(), entries = table.len(), "Loaded title mapping table");
        Ok(table)
    }

    pub fn insert(&mut self, key: impl Into<String>, id: impl Into<String>) {
        self.entries.insert(key.into(), id.into());
    }

    pub fn lookup(&self, key: &str) -> Result<&str, CellError> {
        self.entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CellError::MissingMapping {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MappingTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Built-in dropdown encodings: field, display value, encoded option value.
const BUILTIN_DROPDOWNS: &[(&str, &[(&str, &str)])] = &[
    (
        "支付方式",
        &[("个人转卡", "10"), ("公务卡", "11"), ("对公转账", "12"), ("现金", "13")],
    ),
    (
        "人员类型",
        &[("教师", "1"), ("学生", "2"), ("其他", "3")],
    ),
    (
        "交通费",
        &[("飞机", "1"), ("火车", "2"), ("汽车", "3"), ("其他", "4")],
    ),
    (
        "安排状态",
        &[("自行安排", "0"), ("会务安排", "1")],
    ),
];

/// Field → (display value → encoded option value) for `<select>` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownMappingTable {
    fields: HashMap<String, HashMap<String, String>>,
}

impl DropdownMappingTable {
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// The built-in table merged with configured overrides. Overrides win.
    pub fn with_overrides(overrides: &BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut table = Self::default();
        for (field, options) in overrides {
            let entry = table.fields.entry(field.clone()).or_default();
            for (display, encoded) in options {
                entry.insert(display.clone(), encoded.clone());
            }
        }
        table
    }

    pub fn is_dropdown(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Encoded value for a display value. Unknown display values of a known
    /// field pass through unchanged; unknown fields yield `None`.
    pub fn encode<'a>(&'a self, field: &str, display: &'a str) -> Option<&'a str> {
        let options = self.fields.get(field)?;
        Some(options.get(display).map(String::as_str).unwrap_or(display))
    }

    pub fn insert(&mut self, field: &str, display: &str, encoded: &str) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(display.to_string(), encoded.to_string());
    }
}

impl Default for DropdownMappingTable {
    fn default() -> Self {
        let fields = BUILTIN_DROPDOWNS
            .iter()
            .map(|(field, options)| {
                let options = options
                    .iter()
                    .map(|(display, encoded)| (display.to_string(), encoded.to_string()))
                    .collect();
                (field.to_string(), options)
            })
            .collect();
        Self { fields }
    }
}
