use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

use vitacheck_core::models::Supplement;

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report an expected failure (not found, rejected input) and exit with 2.
pub(crate) fn fail(json: bool, message: &str) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn checkbox(taken: bool) -> &'static str {
    if taken { "[x]" } else { "[ ]" }
}

pub(crate) fn print_supplement_table(supplements: &[Supplement]) {
    #[derive(Tabled)]
    struct SupplementRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Dosage")]
        dosage: String,
        #[tabled(rename = "When")]
        relation: String,
        #[tabled(rename = "Period")]
        period: String,
    }

    let rows: Vec<SupplementRow> = supplements
        .iter()
        .enumerate()
        .map(|(i, s)| SupplementRow {
            idx: i + 1,
            id: s.id.clone(),
            name: truncate(&s.name, 35),
            dosage: truncate(&s.dosage, 20),
            relation: s.relation.label().to_string(),
            period: s.period.label().to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}
