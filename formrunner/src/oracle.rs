//! The external helper consulted after a print confirmation.
//!
//! The helper reads the appointment number and total amount off the
//! confirmation page and drives the native print dialog to save the PDF.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactInfo;
use crate::errors::OracleError;

/// Outcome of the helper's save step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRun {
    pub path: PathBuf,
    pub success: bool,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn extract_artifact_info(&self) -> Result<ArtifactInfo, OracleError>;

    /// Save the artifact as `save_dir/file_name`.
    async fn run_external_automation(
        &self,
        save_dir: &Path,
        file_name: &str,
    ) -> Result<ExternalRun, OracleError>;
}

/// Oracle for runs without a helper: nothing is extracted or saved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOracle;

#[async_trait]
impl Oracle for NoopOracle {
    async fn extract_artifact_info(&self) -> Result<ArtifactInfo, OracleError> {
        Ok(ArtifactInfo::unknown())
    }

    async fn run_external_automation(
        &self,
        save_dir: &Path,
        file_name: &str,
    ) -> Result<ExternalRun, OracleError> {
        info!(dir = %save_dir.display(), file_name, "No helper configured, skipping save");
        Ok(ExternalRun {
            path: save_dir.join(file_name),
            success: false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedInfo {
    #[serde(default)]
    appointment_number: String,
    #[serde(default)]
    total_amount: String,
}

/// Runs a Python helper script as a subprocess.
#[derive(Debug, Clone)]
pub struct PythonOracle {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl PythonOracle {
    /// `interpreter` defaults to the first of `python3`/`python` found on `PATH`.
    pub fn new(
        interpreter: Option<String>,
        script: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let script = script.into();
        if !script.is_file() {
            return Err(OracleError::ScriptNotFound(script));
        }
        let interpreter = match interpreter {
            Some(i) => i,
            None => ["python3", "python"]
                .into_iter()
                .find_map(find_executable)
                .ok_or_else(|| OracleError::InterpreterNotFound("python3".into()))?,
        };
        info!(interpreter = %interpreter, script = %script.display(), "Using helper script");
        Ok(Self {
            interpreter,
            script,
            timeout,
        })
    }

    async fn run_helper(&self, args: &[&str]) -> Result<String, OracleError> {
        use tokio::process::Command;

        debug!(interpreter = %self.interpreter, ?args, "Spawning helper");
        let child = Command::new(&self.interpreter)
            .arg(&self.script)
            .args(args)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| OracleError::Timeout(self.timeout.as_millis() as u64))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(OracleError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Oracle for PythonOracle {
    async fn extract_artifact_info(&self) -> Result<ArtifactInfo, OracleError> {
        let stdout = self.run_helper(&["--operation", "extract_info"]).await?;
        let info = parse_extracted(&stdout)?;
        info!(
            appointment = %info.appointment_number,
            amount = %info.total_amount,
            "Extracted artifact info"
        );
        Ok(info)
    }

    async fn run_external_automation(
        &self,
        save_dir: &Path,
        file_name: &str,
    ) -> Result<ExternalRun, OracleError> {
        tokio::fs::create_dir_all(save_dir).await?;
        let dir = save_dir.to_string_lossy();
        let stdout = self
            .run_helper(&[
                "--operation",
                "print_dialog",
                "--filepath",
                &dir,
                "--filename",
                file_name,
            ])
            .await?;
        let success = !stdout.contains(FAILURE_MARKER);
        if !success {
            warn!(output = %stdout.trim(), "Helper reported a failed save");
        }
        Ok(ExternalRun {
            path: save_dir.join(file_name),
            success,
        })
    }
}

/// Printed by the helper when the dialog step fails.
const FAILURE_MARKER: &str = "✗";

/// Take the last line of stdout that parses as the info object; helpers
/// tend to print progress lines first.
fn parse_extracted(stdout: &str) -> Result<ArtifactInfo, OracleError> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<ExtractedInfo>(line.trim()).ok())
        .map(|raw| ArtifactInfo::cleaned(&raw.appointment_number, &raw.total_amount))
        .ok_or_else(|| {
            OracleError::InvalidOutput(stdout.chars().take(200).collect::<String>())
        })
}

/// Locate `name` on `PATH`, trying Windows executable extensions first.
pub fn find_executable(name: &str) -> Option<String> {
    use std::env;

    let candidates = if cfg!(windows) {
        vec![format!("{name}.exe"), format!("{name}.cmd"), name.to_string()]
    } else {
        vec![name.to_string()]
    };

    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        for candidate in &candidates {
            let full_path = dir.join(candidate);
            if full_path.is_file() {
                debug!("Found executable: {}", full_path.display());
                return Some(full_path.to_string_lossy().to_string());
            }
        }
    }
    None
}
