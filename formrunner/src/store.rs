//! Workbook persistence.
//!
//! A workbook is a JSON object holding named sheets, each a list of rows:
//!
//! ```json
//! { "sheets": { "BaoXiao_sheet": [["科目", "金额"], ["#旅费", 100]] } }
//! ```
//!
//! Numbers, booleans and nulls are accepted in cells and read back as strings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::Document;
use crate::errors::RunnerError;

/// Loads and saves documents. Spreadsheet formats live behind this seam.
pub trait DocumentStore: Send + Sync {
    fn load(&self, path: &Path, sheet: &str) -> Result<Document, RunnerError>;

    fn save(&self, path: &Path, document: &Document) -> Result<(), RunnerError> {
        self.save_as(path, path, document)
    }

    /// Write `document` to `target`, carrying over the other sheets of the
    /// workbook at `original`.
    fn save_as(
        &self,
        original: &Path,
        target: &Path,
        document: &Document,
    ) -> Result<(), RunnerError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Workbook {
    sheets: BTreeMap<String, Vec<Vec<Value>>>,
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON workbook store.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWorkbookStore;

impl JsonWorkbookStore {
    fn read_workbook(path: &Path) -> Result<Workbook, RunnerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::DocumentNotFound(path.to_path_buf())
            } else {
                RunnerError::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl DocumentStore for JsonWorkbookStore {
    fn load(&self, path: &Path, sheet: &str) -> Result<Document, RunnerError> {
        let mut workbook = Self::read_workbook(path)?;
        let raw = workbook
            .sheets
            .remove(sheet)
            .ok_or_else(|| RunnerError::SheetMissing {
                path: path.to_path_buf(),
                sheet: sheet.to_string(),
            })?;

        let rows: Vec<Vec<String>> = raw
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        let document = Document::new(sheet, rows)?;
        info!(
            path = %path.display(),
            sheet,
            rows = document.row_count(),
            columns = document.column_count(),
            "Loaded sheet"
        );
        Ok(document)
    }

    fn save_as(
        &self,
        original: &Path,
        target: &Path,
        document: &Document,
    ) -> Result<(), RunnerError> {
        let mut workbook = match Self::read_workbook(original) {
            Ok(workbook) => workbook,
            Err(RunnerError::DocumentNotFound(_)) => {
                debug!(path = %original.display(), "Starting a fresh workbook");
                Workbook::default()
            }
            Err(RunnerError::Io(e)) => return Err(RunnerError::persistence(original, e)),
            Err(e) => return Err(e),
        };
        let rows = document
            .rows()
            .iter()
            .map(|row| row.iter().map(|c| Value::String(c.clone())).collect())
            .collect();
        workbook.sheets.insert(document.sheet().to_string(), rows);

        let payload = serde_json::to_string_pretty(&workbook)?;
        std::fs::write(target, payload).map_err(|e| RunnerError::persistence(target, e))?;
        info!(path = %target.display(), sheet = document.sheet(), "Saved sheet");
        Ok(())
    }
}
