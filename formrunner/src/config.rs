use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::DEFAULT_BRIDGE_ADDR;

pub const DEFAULT_DOCUMENT_PATH: &str = "报销信息.json";
pub const DEFAULT_MAPPING_PATH: &str = "标题-ID.json";
pub const DEFAULT_SHEET_NAME: &str = "BaoXiao_sheet";
pub const DEFAULT_MAPPING_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_ARTIFACT_DIR: &str = "pdf";
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Everything a run needs before traversal starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub document_path: PathBuf,
    pub mapping_path: PathBuf,
    pub sheet_name: String,
    pub mapping_sheet_name: String,
    /// Directory the exported confirmation PDF is saved into.
    pub artifact_dir: PathBuf,
    /// Helper script consulted after print confirmation; none disables it.
    pub helper_script: Option<PathBuf>,
    /// Interpreter for the helper; looked up on `PATH` when unset.
    pub python: Option<String>,
    pub bridge_addr: String,
    pub command_timeout_ms: u64,
    /// Extra dropdown encodings merged over the built-in table.
    pub dropdowns: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            mapping_path: PathBuf::from(DEFAULT_MAPPING_PATH),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            mapping_sheet_name: DEFAULT_MAPPING_SHEET_NAME.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            helper_script: None,
            python: None,
            bridge_addr: DEFAULT_BRIDGE_ADDR.to_string(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            dropdowns: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load from a YAML file. A missing or invalid file is not an error:
    /// the defaults are used and a warning is logged.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config not readable, using defaults");
                return Self::default();
            }
        };
        match Self::from_yaml_str(&text) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Relative document, mapping, and artifact paths are taken relative to `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.document_path,
            &mut self.mapping_path,
            &mut self.artifact_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(script) = self.helper_script.as_mut() {
            if script.is_relative() {
                *script = base.join(&*script);
            }
        }
        self
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = RunConfig::from_yaml_str(
            "sheet_name: Travel\ndropdowns:\n  交通工具:\n    火车: \"2\"\n",
        )
        .unwrap();
        assert_eq!(config.sheet_name, "Travel");
        assert_eq!(config.mapping_sheet_name, DEFAULT_MAPPING_SHEET_NAME);
        assert_eq!(config.document_path, PathBuf::from(DEFAULT_DOCUMENT_PATH));
        assert_eq!(config.dropdowns["交通工具"]["火车"], "2");
    }

    #[test]
    fn test_missing_or_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            RunConfig::load_or_default(&dir.path().join("absent.yaml")),
            RunConfig::default()
        );

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "sheet_name: [unterminated").unwrap();
        assert_eq!(RunConfig::load_or_default(&bad), RunConfig::default());
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = RunConfig {
            helper_script: Some(PathBuf::from("helper.py")),
            ..RunConfig::default()
        }
        .resolve_relative_to(Path::new("/work"));
        assert_eq!(config.document_path, PathBuf::from("/work/报销信息.json"));
        assert_eq!(config.artifact_dir, PathBuf::from("/work/pdf"));
        assert_eq!(config.helper_script, Some(PathBuf::from("/work/helper.py")));
    }
}
