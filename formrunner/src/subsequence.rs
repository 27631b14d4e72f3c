//! Sentinel-delimited repeating row ranges.
//!
//! A start sentinel cell holding a marker turns the following rows into a
//! subsequence over the columns between the start sentinel and its paired end
//! sentinel. The controller keeps processing rows until the end sentinel cell
//! carries the kind's end marker, then hands a resume point back to the
//! driver.

use std::ops::Range;

use tracing::{debug, info, instrument, warn};

use crate::document::{column_name, normalize_cell, Document};
use crate::interpreter::Interpreter;
use crate::report::SubsequenceRecord;
use crate::state::SubsequenceMode;

/// Marker for a first-kind subsequence, and its end marker.
pub const FIRST_KIND_MARKER: &str = "是";
/// Marker for a second-kind (index-resolving) subsequence, and its end marker.
pub const SECOND_KIND_MARKER: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsequenceKind {
    First,
    Second,
}

impl SubsequenceKind {
    /// The kind a start-sentinel value opens, if any.
    pub fn from_marker(value: &str) -> Option<Self> {
        match normalize_cell(value).as_str() {
            FIRST_KIND_MARKER => Some(SubsequenceKind::First),
            SECOND_KIND_MARKER => Some(SubsequenceKind::Second),
            _ => None,
        }
    }

    pub fn end_marker(self) -> &'static str {
        match self {
            SubsequenceKind::First => FIRST_KIND_MARKER,
            SubsequenceKind::Second => SECOND_KIND_MARKER,
        }
    }

    pub fn mode(self) -> SubsequenceMode {
        match self {
            SubsequenceKind::First => SubsequenceMode::First,
            SubsequenceKind::Second => SubsequenceMode::Second,
        }
    }
}

/// Where the driver picks up after a subsequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Continue on `row` from column `col`.
    At { row: usize, col: usize },
    /// The document ran out before an end marker; traversal is over.
    Stop,
}

/// Columns a subsequence opened at `start` operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRange {
    pub start: usize,
    /// Paired end sentinel column; `None` when the range is unbounded.
    pub end: Option<usize>,
    /// Columns processed on every row.
    pub columns: Range<usize>,
    /// First column after the subsequence on the resume row.
    pub resume_col: usize,
}

/// Start and end sentinel columns in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelLayout {
    starts: Vec<usize>,
    ends: Vec<usize>,
    column_count: usize,
}

impl SentinelLayout {
    pub fn discover(document: &Document) -> Self {
        let mut layout = SentinelLayout {
            column_count: document.column_count(),
            ..Default::default()
        };
        for (col, header) in document.headers().enumerate() {
            if header.is_subsequence_start() {
                layout.starts.push(col);
            } else if header.is_subsequence_end() {
                layout.ends.push(col);
            }
        }
        if layout.ends.len() > layout.starts.len() {
            warn!(
                starts = layout.starts.len(),
                ends = layout.ends.len(),
                "More end sentinels than start sentinels; extra ends are ignored"
            );
        }
        debug!(starts = ?layout.starts, ends = ?layout.ends, "Discovered sentinel columns");
        layout
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// The end column paired with the start at `start_col`.
    ///
    /// Pairing is positional; unmatched starts reuse the last end column. An
    /// end at or before its start is treated as absent.
    pub fn paired_end(&self, start_col: usize) -> Option<usize> {
        let position = self.starts.iter().position(|&c| c == start_col)?;
        let end = self.ends.get(position).or(self.ends.last()).copied()?;
        if end <= start_col {
            warn!(
                start_col,
                end_col = end,
                "Paired end sentinel precedes its start; treating range as unbounded"
            );
            return None;
        }
        Some(end)
    }

    pub fn range_for(&self, start_col: usize) -> ActiveRange {
        let end = self.paired_end(start_col);
        let stop = end.unwrap_or(self.column_count);
        ActiveRange {
            start: start_col,
            end,
            columns: (start_col + 1)..stop,
            resume_col: end.map(|e| e + 1).unwrap_or(self.column_count),
        }
    }
}

impl Interpreter {
    /// Run the subsequence opened at (`row`, `start_col`) and return where
    /// traversal resumes.
    #[instrument(skip(self))]
    pub(crate) async fn run_subsequence(
        &mut self,
        row: usize,
        start_col: usize,
        kind: SubsequenceKind,
    ) -> Resume {
        let range = self.layout().range_for(start_col);
        let last_row = self.document().last_row();
        info!(
            ?kind,
            row,
            start = %column_name(range.start),
            end = ?range.end.map(column_name),
            "Entering subsequence"
        );

        self.state_mut().enter_subsequence(kind.mode());
        let mut current = row;
        let mut iterations = 0;
        let resume = loop {
            if current > last_row {
                info!(?kind, "Document ended without an end marker, stopping traversal");
                break Resume::Stop;
            }

            debug!(row = current, index = self.state().subsequence_index, "Subsequence row");
            self.process_columns(current, range.columns.clone(), true).await;
            iterations += 1;

            let ended = range.end.is_some_and(|end| {
                normalize_cell(self.document().cell(current, end)) == kind.end_marker()
            });
            if ended {
                info!(?kind, row = current, iterations, "Subsequence closed");
                break Resume::At {
                    row: current,
                    col: range.resume_col,
                };
            }

            if kind == SubsequenceKind::Second {
                self.state_mut().subsequence_index += 1;
            }
            current += 1;
        };
        self.state_mut().leave_subsequence();

        self.record_subsequence(SubsequenceRecord {
            kind: kind.mode(),
            start_row: row,
            start_col,
            end_row: match resume {
                Resume::At { row, .. } => Some(row),
                Resume::Stop => None,
            },
            iterations,
        });
        resume
    }
}
