#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use formrunner::{
    Actuator, ActuatorError, ArtifactInfo, Classifier, Document, ExternalRun, IdResolver,
    Interpreter, MappingTable, Oracle, OracleError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Click(String),
    Radio(String),
    Card(String),
    SubjectAmount(String, String),
    Dropdown(String, String),
    Date(String, String),
    Fill(String, String),
    Enter,
    Wait(f64),
}

/// Records every call; ids listed in `failing` are reported as not found.
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<Call>>,
    failing: Vec<String>,
}

impl RecordingActuator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: ids.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, id: &str, call: Call) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.iter().any(|f| f == id) {
            return Err(ActuatorError::ElementNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn click(&self, id: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::Click(id.into()))
    }

    async fn radio_click(&self, id: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::Radio(id.into()))
    }

    async fn select_card(&self, tail: &str) -> Result<(), ActuatorError> {
        self.record(tail, Call::Card(tail.into()))
    }

    async fn fill_subject_amount(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::SubjectAmount(id.into(), value.into()))
    }

    async fn select_dropdown(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::Dropdown(id.into(), value.into()))
    }

    async fn select_date(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::Date(id.into(), value.into()))
    }

    async fn plain_fill(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.record(id, Call::Fill(id.into(), value.into()))
    }

    async fn press_enter(&self) -> Result<(), ActuatorError> {
        self.record("", Call::Enter)
    }

    async fn wait(&self, seconds: f64) -> Result<(), ActuatorError> {
        self.record("", Call::Wait(seconds))
    }
}

/// Returns fixed artifact info and counts how often it was consulted.
pub struct ScriptedOracle {
    info: Option<ArtifactInfo>,
    pub extractions: Mutex<usize>,
    pub saves: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn returning(appointment: &str, amount: &str) -> Arc<Self> {
        Arc::new(Self {
            info: Some(ArtifactInfo::cleaned(appointment, amount)),
            extractions: Mutex::new(0),
            saves: Mutex::new(Vec::new()),
        })
    }

    /// An oracle whose extraction always fails.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            info: None,
            extractions: Mutex::new(0),
            saves: Mutex::new(Vec::new()),
        })
    }

    pub fn extraction_count(&self) -> usize {
        *self.extractions.lock().unwrap()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn extract_artifact_info(&self) -> Result<ArtifactInfo, OracleError> {
        *self.extractions.lock().unwrap() += 1;
        self.info
            .clone()
            .ok_or_else(|| OracleError::InvalidOutput("no page".into()))
    }

    async fn run_external_automation(
        &self,
        save_dir: &Path,
        file_name: &str,
    ) -> Result<ExternalRun, OracleError> {
        self.saves.lock().unwrap().push(file_name.to_string());
        Ok(ExternalRun {
            path: save_dir.join(file_name),
            success: true,
        })
    }
}

pub fn document(rows: &[&[&str]]) -> Document {
    Document::new(
        "BaoXiao_sheet",
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
    .expect("valid document")
}

pub fn mapping(entries: &[(&str, &str)]) -> MappingTable {
    entries.iter().copied().collect()
}

pub fn interpreter(
    doc: Document,
    entries: &[(&str, &str)],
    actuator: Arc<RecordingActuator>,
    oracle: Arc<ScriptedOracle>,
) -> Interpreter {
    Interpreter::new(
        doc,
        IdResolver::new(mapping(entries)),
        Classifier::default(),
        actuator,
        oracle,
    )
    .with_artifact_dir("/tmp/formrunner-artifacts")
}

pub fn fill(id: &str, value: &str) -> Call {
    Call::Fill(id.into(), value.into())
}
