//! The in-memory script grid.
//!
//! Row 0 is the header row, every following row is a data row. All rows are
//! kept at the header's width so `(row, col)` addressing never goes out of
//! bounds for a valid column.

use serde::{Deserialize, Serialize};

use crate::errors::RunnerError;

/// Header prefix flagging a column whose value is synthesized from run state.
pub const COMPUTED_MARKER: &str = "%";
/// Header of a column that opens a subsequence.
pub const SUBSEQUENCE_START: &str = "子序列开始";
/// Header of a column that closes a subsequence.
pub const SUBSEQUENCE_END: &str = "子序列结束";

/// A column header and the flags derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a>(pub &'a str);

impl<'a> Header<'a> {
    pub fn name(&self) -> &'a str {
        self.0
    }

    pub fn is_computed(&self) -> bool {
        self.0.starts_with(COMPUTED_MARKER)
    }

    /// The header without its computed marker, if it has one.
    pub fn computed_field(&self) -> Option<&'a str> {
        self.0.strip_prefix(COMPUTED_MARKER)
    }

    pub fn is_subsequence_start(&self) -> bool {
        self.0 == SUBSEQUENCE_START
    }

    pub fn is_subsequence_end(&self) -> bool {
        self.0 == SUBSEQUENCE_END
    }

    pub fn is_sentinel(&self) -> bool {
        self.is_subsequence_start() || self.is_subsequence_end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    sheet: String,
    rows: Vec<Vec<String>>,
}

impl Document {
    /// Build a document from raw rows, padding short rows to the header width.
    pub fn new(sheet: impl Into<String>, mut rows: Vec<Vec<String>>) -> Result<Self, RunnerError> {
        let sheet = sheet.into();
        let width = rows
            .first()
            .map(|h| h.len())
            .ok_or_else(|| RunnerError::MalformedDocument(format!("sheet '{sheet}' has no header row")))?;

        for (index, row) in rows.iter_mut().enumerate().skip(1) {
            if row.len() > width {
                return Err(RunnerError::MalformedDocument(format!(
                    "row {} of sheet '{sheet}' has {} cells but the header has {width}",
                    index + 1,
                    row.len()
                )));
            }
            row.resize(width, String::new());
        }

        Ok(Self { sheet, rows })
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.rows[0].len()
    }

    /// Number of rows including the header.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the last data row, `0` when there are none.
    pub fn last_row(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn header(&self, col: usize) -> Header<'_> {
        Header(self.rows[0].get(col).map(String::as_str).unwrap_or(""))
    }

    pub fn headers(&self) -> impl Iterator<Item = Header<'_>> {
        self.rows[0].iter().map(|h| Header(h.as_str()))
    }

    /// Cell value; absent cells read as the empty string.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrite a cell in place. Out-of-range coordinates are ignored.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }

    /// Spreadsheet-style address (`B3`) of a zero-based row/column pair.
    pub fn address(row: usize, col: usize) -> String {
        format!("{}{}", column_name(col), row + 1)
    }
}

/// Spreadsheet letters for a zero-based column index (`0` → `A`, `26` → `AA`).
pub fn column_name(col: usize) -> String {
    let mut index = col + 1;
    let mut name = Vec::new();
    while index > 0 {
        index -= 1;
        name.push(b'A' + (index % 26) as u8);
        index /= 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Normalize a raw cell: trim, and drop the `.0` that numeric cells pick up
/// when a spreadsheet exports an integer as a float.
pub fn normalize_cell(raw: &str) -> String {
    let value = raw.trim();
    if let Some(integral) = value.strip_suffix(".0") {
        let digits = integral.strip_prefix('-').unwrap_or(integral);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return integral.to_string();
        }
    }
    value.to_string()
}
