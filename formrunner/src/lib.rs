//! Spreadsheet-driven form filling
//!
//! Each cell of a script sheet encodes one command (click, select, type,
//! wait, compute). The [`Interpreter`] classifies cells in document order,
//! resolves titles to element ids through a [`MappingTable`], and dispatches
//! commands to an [`Actuator`]. Sentinel columns delimit repeating row ranges
//! handled by the subsequence controller.

pub mod actuator;
pub mod artifact;
pub mod bridge;
pub mod browser;
pub mod command;
pub mod config;
pub mod document;
pub mod errors;
pub mod interpreter;
pub mod mapping;
pub mod oracle;
pub mod output;
pub mod report;
pub mod resolver;
pub mod state;
pub mod store;
pub mod subsequence;

pub use actuator::{Actuator, DryRunActuator};
pub use artifact::{clean_appointment_number, clean_total_amount, ArtifactInfo};
pub use bridge::BrowserBridge;
pub use browser::BrowserActuator;
pub use command::{Classifier, Command};
pub use config::RunConfig;
pub use document::{Document, Header};
pub use errors::{ActuatorError, CellError, OracleError, PersistenceKind, RunnerError};
pub use interpreter::Interpreter;
pub use mapping::{DropdownMappingTable, MappingTable};
pub use oracle::{ExternalRun, NoopOracle, Oracle, PythonOracle};
pub use output::{OutputField, OutputWriter};
pub use report::{CellFailure, CellWrite, RunOutcome, RunReport, SubsequenceRecord};
pub use resolver::IdResolver;
pub use state::{RunState, SubsequenceMode};
pub use store::{DocumentStore, JsonWorkbookStore};
pub use subsequence::{Resume, SentinelLayout, SubsequenceKind};
