use serde::Serialize;

/// Which kind of subsequence, if any, the interpreter is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsequenceMode {
    #[default]
    None,
    First,
    Second,
}

/// Mutable state accumulated over one document run.
///
/// Owned by the [`crate::Interpreter`] and only ever touched from the task
/// driving the run, so it needs no synchronization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub subsequence_mode: SubsequenceMode,
    /// Zero-based offset of the row being processed inside a second-kind subsequence.
    pub subsequence_index: usize,
    /// Identifier resolved from the last successful subject cell, consumed by the next amount cell.
    pub pending_subject_id: Option<String>,
    /// Path of the exported artifact, set once per run after a print confirmation.
    pub last_artifact_path: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_subsequence(&mut self, mode: SubsequenceMode) {
        self.subsequence_mode = mode;
        self.subsequence_index = 0;
    }

    pub fn leave_subsequence(&mut self) {
        self.subsequence_mode = SubsequenceMode::None;
        self.subsequence_index = 0;
    }

    pub fn in_subsequence(&self) -> bool {
        self.subsequence_mode != SubsequenceMode::None
    }
}
