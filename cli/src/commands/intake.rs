use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use vitacheck_core::models::Period;
use vitacheck_core::service::VitaService;

use super::helpers::{checkbox, fail, truncate};

pub(crate) fn cmd_today(svc: &VitaService, json: bool) -> Result<()> {
    let view = svc.today_view()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if view.periods.iter().all(|p| p.items.is_empty()) {
        eprintln!("No supplements yet. Add one with `vitacheck supplement add`");
        process::exit(2);
    }

    let date = &view.date;
    println!("=== {date} ===\n");

    for period in view.periods.iter().filter(|p| !p.items.is_empty()) {
        let label = period.period.label().to_uppercase();
        let done = period.items.iter().filter(|i| i.taken).count();
        let total = period.items.len();
        let status = if period.all_taken { " - all taken" } else { "" };
        println!("  {label} ({done}/{total}){status}");
        for item in &period.items {
            println!(
                "    {} {} ({}), {}  [{}]",
                checkbox(item.taken),
                item.name,
                item.dosage,
                item.relation.label(),
                item.id
            );
        }
        println!();
    }

    Ok(())
}

pub(crate) fn cmd_take(svc: &VitaService, id: &str, json: bool) -> Result<()> {
    let Some((supplement, taken)) = svc.toggle(id)? else {
        fail(json, &format!("Supplement {id} not found"));
    };
    let now_taken = taken.get(id).copied().unwrap_or(false);

    if json {
        println!("{}", serde_json::json!({ "id": id, "taken": now_taken }));
    } else if now_taken {
        println!("Took {} ({})", supplement.name, supplement.dosage);
    } else {
        println!("Marked {} as not taken", supplement.name);
    }
    Ok(())
}

pub(crate) fn cmd_mark(svc: &VitaService, ids: &[String], undo: bool, json: bool) -> Result<()> {
    if ids.is_empty() {
        bail!("Provide at least one supplement id");
    }
    let catalog = svc.list_supplements()?;
    if let Some(unknown) = ids.iter().find(|id| !catalog.iter().any(|s| &s.id == *id)) {
        fail(json, &format!("Supplement {unknown} not found"));
    }

    let value = !undo;
    let taken = svc.set_many(ids, value)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&taken)?);
    } else {
        let state = if value { "taken" } else { "not taken" };
        println!("Marked {} supplement(s) as {state}", ids.len());
    }
    Ok(())
}

pub(crate) fn cmd_mark_all(svc: &VitaService, period: &str, json: bool) -> Result<()> {
    let period: Period = period.parse()?;
    if !svc
        .list_supplements()?
        .iter()
        .any(|s| s.period == period)
    {
        fail(json, &format!("No {} to mark", period.phrase()));
    }

    let (value, taken) = svc.mark_period(period)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "period": period, "taken": value, "map": taken })
        );
    } else if value {
        println!("Marked all {} as taken", period.phrase());
    } else {
        println!("Marked all {} as not taken", period.phrase());
    }
    Ok(())
}

pub(crate) fn cmd_history(svc: &VitaService, days: Option<usize>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Taken")]
        taken: String,
        #[tabled(rename = "Missed")]
        missed: String,
    }

    let history = svc.history(days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        eprintln!("No intake recorded yet");
        process::exit(2);
    }

    // Newest first
    let rows: Vec<HistoryRow> = history
        .iter()
        .rev()
        .map(|(date, record)| {
            let missed: Vec<&str> = record
                .supplements
                .iter()
                .filter(|s| !record.is_taken(&s.id))
                .map(|s| s.name.as_str())
                .collect();
            let done = record.supplements.len() - missed.len();
            let total = record.supplements.len();
            HistoryRow {
                date: date.clone(),
                taken: format!("{done}/{total}"),
                missed: truncate(&missed.join(", "), 50),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
