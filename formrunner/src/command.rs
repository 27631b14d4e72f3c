//! Cell classification.
//!
//! Every `(header, value)` pair maps to exactly one [`Command`]. The rules
//! are evaluated in a fixed priority order and the first match wins.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::document::{normalize_cell, Header};
use crate::errors::CellError;
use crate::mapping::DropdownMappingTable;
use crate::state::RunState;

/// Header of the column holding wait durations in seconds.
pub const WAIT_FIELD: &str = "等待";
/// Header of the column that presses Enter when marked with the click sentinel.
pub const ENTER_FIELD: &str = "回车";
/// Header of the column whose value fills the pending subject's amount input.
pub const AMOUNT_FIELD: &str = "金额";
/// Cell value that clicks the element named by the header.
pub const CLICK_SENTINEL: &str = "$点击";
/// Cell value that clicks a reservation button named by the header.
pub const RESERVATION_SENTINEL: &str = "$预约";
/// Value prefix selecting a radio button by title.
pub const RADIO_PREFIX: &str = "$$";
/// Value prefix selecting a bank card by its number's tail.
pub const CARD_PREFIX: &str = "*";
/// Value prefix naming an expense subject.
pub const SUBJECT_PREFIX: &str = "#";
/// Prefix accepted in front of wait durations (`$3` waits three seconds).
const WAIT_VALUE_PREFIX: &str = "$";

const DATE_HEADER_PATTERN: &str = r"(?i)日期|\bdate\b";
const DATE_VALUE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Click { label: String },
    RadioClick { label: String },
    CardSelect { tail: String },
    SubjectInput { name: String },
    AmountInput { subject_id: String, amount: String },
    Dropdown { field: String, value: String },
    DateSelect { field: String, value: String },
    Wait { seconds: f64 },
    PressEnter,
    Computed { field: String },
    PlainInput { field: String, value: String },
    Skip,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Click { .. } => "click",
            Command::RadioClick { .. } => "radio_click",
            Command::CardSelect { .. } => "card_select",
            Command::SubjectInput { .. } => "subject_input",
            Command::AmountInput { .. } => "amount_input",
            Command::Dropdown { .. } => "dropdown",
            Command::DateSelect { .. } => "date_select",
            Command::Wait { .. } => "wait",
            Command::PressEnter => "press_enter",
            Command::Computed { .. } => "computed",
            Command::PlainInput { .. } => "plain_input",
            Command::Skip => "skip",
        }
    }

    /// The title this command resolves through the mapping table, if any.
    pub fn title(&self) -> Option<&str> {
        match self {
            Command::Click { label } | Command::RadioClick { label } => Some(label.as_str()),
            Command::SubjectInput { name } => Some(name.as_str()),
            Command::Dropdown { field, .. }
            | Command::DateSelect { field, .. }
            | Command::PlainInput { field, .. } => Some(field.as_str()),
            Command::CardSelect { .. }
            | Command::AmountInput { .. }
            | Command::Wait { .. }
            | Command::PressEnter
            | Command::Computed { .. }
            | Command::Skip => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Click { label } => write!(f, "Click({label})"),
            Command::RadioClick { label } => write!(f, "RadioClick({label})"),
            Command::CardSelect { tail } => write!(f, "CardSelect({tail})"),
            Command::SubjectInput { name } => write!(f, "SubjectInput({name})"),
            Command::AmountInput { subject_id, amount } => {
                write!(f, "AmountInput({subject_id}, {amount})")
            }
            Command::Dropdown { field, value } => write!(f, "Dropdown({field}, {value})"),
            Command::DateSelect { field, value } => write!(f, "DateSelect({field}, {value})"),
            Command::Wait { seconds } => write!(f, "Wait({seconds}s)"),
            Command::PressEnter => write!(f, "PressEnter"),
            Command::Computed { field } => write!(f, "Computed({field})"),
            Command::PlainInput { field, value } => write!(f, "PlainInput({field}, {value})"),
            Command::Skip => write!(f, "Skip"),
        }
    }
}

/// Maps cells to commands.
#[derive(Debug, Clone)]
pub struct Classifier {
    dropdowns: DropdownMappingTable,
    date_header: Regex,
    date_value: Regex,
}

impl Classifier {
    pub fn new(dropdowns: DropdownMappingTable) -> Self {
        Self {
            dropdowns,
            date_header: Regex::new(DATE_HEADER_PATTERN).expect("valid date header pattern"),
            date_value: Regex::new(DATE_VALUE_PATTERN).expect("valid date value pattern"),
        }
    }

    pub fn dropdowns(&self) -> &DropdownMappingTable {
        &self.dropdowns
    }

    /// Classify one cell.
    ///
    /// Sentinel columns drive control flow and never produce a command, so
    /// they classify as [`Command::Skip`] here.
    pub fn classify(
        &self,
        header: Header<'_>,
        raw_value: &str,
        state: &RunState,
    ) -> Result<Command, CellError> {
        if let Some(field) = header.computed_field() {
            return Ok(Command::Computed {
                field: field.to_string(),
            });
        }

        let value = normalize_cell(raw_value);
        if value.is_empty() || header.is_sentinel() {
            return Ok(Command::Skip);
        }
        let name = header.name();

        if name == WAIT_FIELD {
            return parse_wait(&value).map(|seconds| Command::Wait { seconds });
        }

        if name == ENTER_FIELD && value == CLICK_SENTINEL {
            return Ok(Command::PressEnter);
        }

        if value == CLICK_SENTINEL || value == RESERVATION_SENTINEL {
            return Ok(Command::Click {
                label: name.to_string(),
            });
        }

        if let Some(label) = value.strip_prefix(RADIO_PREFIX) {
            return Ok(Command::RadioClick {
                label: label.to_string(),
            });
        }

        if let Some(tail) = value.strip_prefix(CARD_PREFIX) {
            return Ok(Command::CardSelect {
                tail: tail.to_string(),
            });
        }

        if let Some(subject) = value.strip_prefix(SUBJECT_PREFIX) {
            return Ok(Command::SubjectInput {
                name: subject.to_string(),
            });
        }

        if self.dropdowns.is_dropdown(name) {
            return Ok(Command::Dropdown {
                field: name.to_string(),
                value,
            });
        }

        if self.date_header.is_match(name) || self.date_value.is_match(&value) {
            if NaiveDate::parse_from_str(&value, "%Y-%m-%d").is_err() {
                return Err(CellError::ParseFailure {
                    value,
                    expected: "a YYYY-MM-DD date",
                });
            }
            return Ok(Command::DateSelect {
                field: name.to_string(),
                value,
            });
        }

        if name == AMOUNT_FIELD {
            if let Some(subject_id) = &state.pending_subject_id {
                return Ok(Command::AmountInput {
                    subject_id: subject_id.clone(),
                    amount: value,
                });
            }
        }

        Ok(Command::PlainInput {
            field: name.to_string(),
            value,
        })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DropdownMappingTable::default())
    }
}

fn parse_wait(value: &str) -> Result<f64, CellError> {
    let digits = value.strip_prefix(WAIT_VALUE_PREFIX).unwrap_or(value).trim();
    match digits.parse::<f64>() {
        Ok(seconds) if Duration::try_from_secs_f64(seconds).is_ok() => Ok(seconds),
        _ => Err(CellError::ParseFailure {
            value: value.to_string(),
            expected: "a non-negative number of seconds",
        }),
    }
}
