//! The traversal driver.
//!
//! Data rows are scanned top to bottom and columns left to right. A start
//! sentinel with a valid marker hands the row over to the subsequence
//! controller; the returned resume point is fed back into an explicit
//! `(row, column)` work loop, so any number of subsequences placed side by
//! side on one row are chained without recursion.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::actuator::Actuator;
use crate::artifact::ArtifactInfo;
use crate::command::{Classifier, Command};
use crate::config::DEFAULT_ARTIFACT_DIR;
use crate::document::{normalize_cell, Document};
use crate::errors::CellError;
use crate::oracle::Oracle;
use crate::output::OutputWriter;
use crate::report::{CellFailure, CellWrite, RunReport, SubsequenceRecord};
use crate::resolver::IdResolver;
use crate::state::RunState;
use crate::subsequence::{Resume, SentinelLayout, SubsequenceKind};

/// Click labels that open the print confirmation and trigger the oracle.
pub const PRINT_CONFIRM_LABELS: [&str; 3] = ["打印确认单按钮", "打印按钮", "打印操作"];

pub fn is_print_confirmation(label: &str) -> bool {
    PRINT_CONFIRM_LABELS.contains(&label)
}

/// Interprets one document against an actuator.
pub struct Interpreter {
    document: Document,
    layout: SentinelLayout,
    resolver: IdResolver,
    classifier: Classifier,
    actuator: Arc<dyn Actuator>,
    oracle: Arc<dyn Oracle>,
    output: OutputWriter,
    artifact_dir: PathBuf,
    state: RunState,
    report: RunReport,
}

impl Interpreter {
    pub fn new(
        document: Document,
        resolver: IdResolver,
        classifier: Classifier,
        actuator: Arc<dyn Actuator>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let layout = SentinelLayout::discover(&document);
        let report = RunReport {
            sheet: document.sheet().to_string(),
            ..RunReport::default()
        };
        Self {
            document,
            layout,
            resolver,
            classifier,
            actuator,
            oracle,
            output: OutputWriter,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            state: RunState::new(),
            report,
        }
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Give back the document, including computed write-backs, for saving.
    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut RunState {
        &mut self.state
    }

    pub(crate) fn layout(&self) -> &SentinelLayout {
        &self.layout
    }

    pub(crate) fn record_subsequence(&mut self, record: SubsequenceRecord) {
        // the triggering row was already counted by the outer scan
        self.report.rows_visited += record.iterations.saturating_sub(1);
        self.report.subsequences.push(record);
    }

    /// Interpret every data row. Per-cell failures are collected in the
    /// report; nothing here aborts the run.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> RunReport {
        let started = Instant::now();
        let last_row = self.document.last_row();
        let column_count = self.document.column_count();
        info!(
            sheet = %self.document.sheet(),
            rows = last_row,
            columns = column_count,
            subsequence_starts = self.layout.starts().len(),
            "Starting run"
        );

        let mut row = 1;
        'rows: while row <= last_row {
            self.report.rows_visited += 1;
            info!(row, "Processing row");

            let (mut scan_row, mut from_col) = (row, 0);
            loop {
                let Some((start_col, kind)) = self
                    .process_columns(scan_row, from_col..column_count, false)
                    .await
                else {
                    break;
                };
                match self.run_subsequence(scan_row, start_col, kind).await {
                    Resume::At { row: resume_row, col } => {
                        scan_row = resume_row;
                        from_col = col;
                    }
                    Resume::Stop => break 'rows,
                }
            }
            row = scan_row + 1;
        }

        self.report.artifact_path = self.state.last_artifact_path.clone();
        self.report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            dispatched = self.report.commands_dispatched,
            failures = self.report.failures.len(),
            writes = self.report.writes.len(),
            duration_ms = self.report.duration_ms,
            "Run finished"
        );
        self.report.clone()
    }

    /// Process `columns` of `row` left to right.
    ///
    /// Outside a subsequence, the scan stops at the first start sentinel with
    /// a valid marker and returns it. Inside one, sentinel cells are inert.
    pub(crate) async fn process_columns(
        &mut self,
        row: usize,
        columns: Range<usize>,
        in_subsequence: bool,
    ) -> Option<(usize, SubsequenceKind)> {
        for col in columns {
            let header = self.document.header(col);
            if header.is_subsequence_start() {
                let value = normalize_cell(self.document.cell(row, col));
                if value.is_empty() {
                    continue;
                }
                if in_subsequence {
                    warn!(
                        cell = %Document::address(row, col),
                        "Start sentinel inside an active subsequence ignored"
                    );
                    continue;
                }
                match SubsequenceKind::from_marker(&value) {
                    Some(kind) => return Some((col, kind)),
                    None => {
                        info!(
                            cell = %Document::address(row, col),
                            value = %value,
                            "Start sentinel value is not a subsequence marker"
                        );
                        continue;
                    }
                }
            }
            if header.is_subsequence_end() {
                continue;
            }
            self.process_cell(row, col).await;
        }
        None
    }

    async fn process_cell(&mut self, row: usize, col: usize) {
        let header = self.document.header(col).name().to_string();
        let raw = self.document.cell(row, col).to_string();

        let command = match self
            .classifier
            .classify(self.document.header(col), &raw, &self.state)
        {
            Ok(command) => command,
            Err(e) => {
                self.record_failure(row, col, &header, "unclassified", e);
                return;
            }
        };
        if command == Command::Skip {
            return;
        }

        debug!(cell = %Document::address(row, col), %command, "Dispatching");
        let kind = command.kind();
        self.report.commands_dispatched += 1;
        if let Err(e) = self.dispatch(row, col, command).await {
            self.record_failure(row, col, &header, kind, e);
        }
    }

    async fn dispatch(&mut self, row: usize, col: usize, command: Command) -> Result<(), CellError> {
        match command {
            Command::Skip => Ok(()),
            Command::Computed { field } => {
                self.write_computed(row, col, &field);
                Ok(())
            }
            Command::Click { label } => {
                let outcome = match self.resolver.resolve(&label, &self.state) {
                    Ok(id) => self.actuator.click(&id).await.map_err(CellError::from),
                    Err(e) => Err(e),
                };
                if is_print_confirmation(&label) {
                    self.capture_artifact().await;
                }
                outcome
            }
            Command::RadioClick { label } => {
                let id = self.resolver.resolve(&label, &self.state)?;
                Ok(self.actuator.radio_click(&id).await?)
            }
            Command::CardSelect { tail } => Ok(self.actuator.select_card(&tail).await?),
            Command::SubjectInput { name } => {
                let id = self.resolver.resolve(&name, &self.state)?;
                debug!(subject = %name, id = %id, "Pending subject set");
                self.state.pending_subject_id = Some(id);
                Ok(())
            }
            Command::AmountInput { subject_id, amount } => {
                let outcome = self.actuator.fill_subject_amount(&subject_id, &amount).await;
                self.state.pending_subject_id = None;
                Ok(outcome?)
            }
            Command::Dropdown { field, value } => {
                let id = self.resolver.resolve(&field, &self.state)?;
                let encoded = self
                    .classifier
                    .dropdowns()
                    .encode(&field, &value)
                    .unwrap_or(value.as_str())
                    .to_string();
                debug!(field = %field, display = %value, encoded = %encoded, "Dropdown value encoded");
                Ok(self.actuator.select_dropdown(&id, &encoded).await?)
            }
            Command::DateSelect { field, value } => {
                let id = self.resolver.resolve(&field, &self.state)?;
                Ok(self.actuator.select_date(&id, &value).await?)
            }
            Command::Wait { seconds } => Ok(self.actuator.wait(seconds).await?),
            Command::PressEnter => Ok(self.actuator.press_enter().await?),
            Command::PlainInput { field, value } => {
                let id = self.resolver.resolve(&field, &self.state)?;
                Ok(self.actuator.plain_fill(&id, &value).await?)
            }
        }
    }

    fn write_computed(&mut self, row: usize, col: usize, field: &str) {
        let Some(value) = self.output.compute(field, &self.state) else {
            return;
        };
        if self.document.set_cell(row, col, value.clone()) {
            debug!(cell = %Document::address(row, col), field, value = %value, "Computed value written");
            self.report.writes.push(CellWrite {
                row,
                cell: Document::address(row, col),
                field: field.to_string(),
                value,
            });
        }
    }

    /// Ask the oracle for the confirmation's values and have it save the
    /// PDF. Only the first print confirmation of a run records an artifact.
    async fn capture_artifact(&mut self) {
        if let Some(path) = &self.state.last_artifact_path {
            info!(existing = %path, "Artifact already recorded for this run, ignoring");
            return;
        }

        let info = match self.oracle.extract_artifact_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Could not extract artifact info, using placeholders");
                ArtifactInfo::unknown()
            }
        };
        let file_name = info.file_name(Local::now());
        let path = match self
            .oracle
            .run_external_automation(&self.artifact_dir, &file_name)
            .await
        {
            Ok(run) => {
                if !run.success {
                    warn!(path = %run.path.display(), "Helper did not confirm the save");
                }
                run.path
            }
            Err(e) => {
                warn!(error = %e, "Helper failed to save the artifact");
                self.artifact_dir.join(&file_name)
            }
        };

        let path = path.to_string_lossy().into_owned();
        info!(path = %path, "Artifact recorded");
        self.state.last_artifact_path = Some(path);
    }

    fn record_failure(
        &mut self,
        row: usize,
        col: usize,
        header: &str,
        command: &'static str,
        error: CellError,
    ) {
        let cell = Document::address(row, col);
        warn!(cell = %cell, header, command, error = %error, "Cell failed, continuing");
        self.report.failures.push(CellFailure {
            row,
            cell,
            header: header.to_string(),
            command,
            error: error.to_string(),
        });
    }
}
