//! Dry classification of a script sheet.

use colored::*;
use formrunner::document::column_name;
use formrunner::{Classifier, Command, Document, IdResolver, RunState, SentinelLayout};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct InspectedCell {
    pub cell: String,
    pub header: String,
    #[serde(flatten)]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub sheet: String,
    pub subsequence_starts: Vec<String>,
    pub subsequence_ends: Vec<String>,
    pub cells: Vec<InspectedCell>,
}

/// Classify every non-empty cell. Titles are resolved with plain keys; a
/// pending subject carries over from a subject cell to the next amount
/// cell as it would during a run.
pub fn inspect(document: &Document, resolver: &IdResolver, classifier: &Classifier) -> Inspection {
    let layout = SentinelLayout::discover(document);
    let mut state = RunState::new();
    let mut cells = Vec::new();

    for row in 1..=document.last_row() {
        for (col, header) in document.headers().enumerate() {
            let cell = Document::address(row, col);
            let (command, target, problem) =
                match classifier.classify(header, document.cell(row, col), &state) {
                    Ok(Command::Skip) => continue,
                    Ok(command) => {
                        let (target, problem) = match command.title() {
                            Some(title) => match resolver.resolve(title, &state) {
                                Ok(id) => (Some(id), None),
                                Err(e) => (None, Some(e.to_string())),
                            },
                            None => (None, None),
                        };
                        match &command {
                            Command::SubjectInput { .. } => state.pending_subject_id = target.clone(),
                            Command::AmountInput { .. } => state.pending_subject_id = None,
                            _ => {}
                        }
                        (Some(command), target, problem)
                    }
                    Err(e) => (None, None, Some(e.to_string())),
                };
            cells.push(InspectedCell {
                cell,
                header: header.name().to_string(),
                command,
                target,
                problem,
            });
        }
    }

    Inspection {
        sheet: document.sheet().to_string(),
        subsequence_starts: layout.starts().iter().map(|&c| column_name(c)).collect(),
        subsequence_ends: layout.ends().iter().map(|&c| column_name(c)).collect(),
        cells,
    }
}

pub fn display(inspection: &Inspection) {
    println!("{} {}", "Sheet:".bold(), inspection.sheet);
    if !inspection.subsequence_starts.is_empty() {
        println!(
            "{} starts {:?}, ends {:?}",
            "Subsequences:".bold(),
            inspection.subsequence_starts,
            inspection.subsequence_ends
        );
    }
    for cell in &inspection.cells {
        let command = cell
            .command
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        match (&cell.target, &cell.problem) {
            (_, Some(problem)) => println!(
                "  {:<6} {:<12} {} {}",
                cell.cell,
                cell.header,
                command,
                problem.red()
            ),
            (Some(target), None) => println!(
                "  {:<6} {:<12} {} → {}",
                cell.cell,
                cell.header,
                command,
                target.green()
            ),
            (None, None) => println!("  {:<6} {:<12} {}", cell.cell, cell.header, command),
        }
    }
}
