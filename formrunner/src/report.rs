use serde::Serialize;

use crate::state::SubsequenceMode;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every cell dispatched cleanly.
    Success,
    /// The run finished but some cells failed.
    Partial,
}

/// A cell whose command failed; the run continued past it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CellFailure {
    pub row: usize,
    /// Spreadsheet address such as `C4`.
    pub cell: String,
    pub header: String,
    pub command: &'static str,
    pub error: String,
}

/// A computed value written back into the document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CellWrite {
    pub row: usize,
    pub cell: String,
    pub field: String,
    pub value: String,
}

/// One subsequence the controller entered.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubsequenceRecord {
    pub kind: SubsequenceMode,
    pub start_row: usize,
    pub start_col: usize,
    /// Row whose end sentinel closed it; `None` when the document ran out.
    pub end_row: Option<usize>,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunReport {
    pub sheet: String,
    /// Data rows the driver visited, counting revisited resume rows once.
    pub rows_visited: usize,
    pub commands_dispatched: usize,
    pub subsequences: Vec<SubsequenceRecord>,
    pub writes: Vec<CellWrite>,
    pub failures: Vec<CellFailure>,
    pub artifact_path: Option<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.failures.is_empty() {
            RunOutcome::Success
        } else {
            RunOutcome::Partial
        }
    }

    /// Report as JSON including the derived outcome.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "outcome".into(),
                serde_json::to_value(self.outcome()).unwrap_or(serde_json::Value::Null),
            );
        }
        value
    }
}
