//! Values for computed (`%`-prefixed) columns.

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::artifact::{artifact_file_name, artifact_segment};
use crate::state::RunState;

/// Written when the artifact a field depends on was never produced.
pub const NOT_GENERATED: &str = "未生成";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The fields a computed column can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    ArtifactPath,
    AppointmentNumber,
    Amount,
    Timestamp,
    FileName,
}

impl OutputField {
    pub fn from_suffix(field: &str) -> Option<Self> {
        match field {
            "文件路径" => Some(OutputField::ArtifactPath),
            "预约号" => Some(OutputField::AppointmentNumber),
            "金额" | "总金额" => Some(OutputField::Amount),
            "生成时间" => Some(OutputField::Timestamp),
            "文件名" => Some(OutputField::FileName),
            _ => None,
        }
    }
}

/// Synthesizes computed column values from run state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputWriter;

impl OutputWriter {
    /// Value for `field`, or `None` for an unknown suffix.
    pub fn compute(&self, field: &str, state: &RunState) -> Option<String> {
        self.compute_at(field, state, Local::now())
    }

    pub fn compute_at(&self, field: &str, state: &RunState, now: DateTime<Local>) -> Option<String> {
        let Some(kind) = OutputField::from_suffix(field) else {
            warn!(field, "Unknown computed field, leaving cell untouched");
            return None;
        };

        let artifact = state.last_artifact_path.as_deref();
        let value = match kind {
            OutputField::ArtifactPath => artifact.map(str::to_string),
            OutputField::AppointmentNumber => artifact.and_then(|p| artifact_segment(p, 0)),
            OutputField::Amount => artifact.and_then(|p| artifact_segment(p, 1)),
            OutputField::FileName => artifact.and_then(artifact_file_name),
            OutputField::Timestamp => Some(now.format(TIMESTAMP_FORMAT).to_string()),
        }
        .unwrap_or_else(|| NOT_GENERATED.to_string());

        debug!(field, value = %value, "Computed output value");
        Some(value)
    }
}
