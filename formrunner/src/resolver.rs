use tracing::debug;

use crate::errors::CellError;
use crate::mapping::MappingTable;
use crate::state::{RunState, SubsequenceMode};

/// Resolves symbolic titles to target identifiers, honouring the
/// index-aware lookup used inside second-kind subsequences.
#[derive(Debug, Clone)]
pub struct IdResolver {
    table: MappingTable,
}

impl IdResolver {
    pub fn new(table: MappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// The lookup key for `title` under the current run state.
    pub fn key_for(title: &str, state: &RunState) -> String {
        match state.subsequence_mode {
            SubsequenceMode::Second => format!("{title}-{}", state.subsequence_index),
            SubsequenceMode::None | SubsequenceMode::First => title.to_string(),
        }
    }

    pub fn resolve(&self, title: &str, state: &RunState) -> Result<String, CellError> {
        let key = Self::key_for(title, state);
        let id = self.table.lookup(&key)?;
        debug!(title, key = %key, id, "Resolved title");
        Ok(id.to_string())
    }
}
