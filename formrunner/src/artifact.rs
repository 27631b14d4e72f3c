//! Exported artifact naming.
//!
//! The print confirmation exports a PDF named
//! `"{appointment}-{amount}-{timestamp}.pdf"`; computed columns later read the
//! segments back out of that name.

use std::path::Path;

use chrono::{DateTime, Local};

/// Appointment number used when the helper cannot extract one.
pub const UNKNOWN_APPOINTMENT: &str = "null";
/// Amount used when the helper's value cannot be parsed.
pub const ZERO_AMOUNT: &str = "0.00";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const ARTIFACT_EXTENSION: &str = "pdf";

/// Values scraped from the confirmation page by the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub appointment_number: String,
    pub total_amount: String,
}

impl ArtifactInfo {
    /// Normalize raw helper output.
    pub fn cleaned(appointment_number: &str, total_amount: &str) -> Self {
        let appointment_number = clean_appointment_number(appointment_number);
        Self {
            appointment_number: if appointment_number.is_empty() {
                UNKNOWN_APPOINTMENT.to_string()
            } else {
                appointment_number
            },
            total_amount: clean_total_amount(total_amount),
        }
    }

    pub fn unknown() -> Self {
        Self {
            appointment_number: UNKNOWN_APPOINTMENT.to_string(),
            total_amount: ZERO_AMOUNT.to_string(),
        }
    }

    pub fn file_name(&self, at: DateTime<Local>) -> String {
        format!(
            "{}-{}-{}.{ARTIFACT_EXTENSION}",
            self.appointment_number,
            self.total_amount,
            at.format(FILE_TIMESTAMP_FORMAT)
        )
    }
}

/// Strip surrounding whitespace and any embedded line breaks.
pub fn clean_appointment_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Drop thousands separators and currency signs, then render with exactly
/// two fractional digits. Anything unparsable becomes `"0.00"`.
pub fn clean_total_amount(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '，' | '¥' | '￥'))
        .collect();
    match stripped.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => format!("{amount:.2}"),
        _ => ZERO_AMOUNT.to_string(),
    }
}

/// File name component of an artifact path.
pub fn artifact_file_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// The `index`-th `-`-delimited segment of the artifact's file stem.
pub fn artifact_segment(path: &str, index: usize) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_string_lossy().into_owned();
    stem.split('-')
        .nth(index)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
