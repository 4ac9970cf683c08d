use anyhow::{Result, bail};
use std::process;
use tabled::{Table, Tabled, settings::Style};

use vitacheck_core::models::{
    COMMON_SUPPLEMENTS, DUPLICATE_SUPPLEMENT, NewSupplement, Period, Relation, filter_suggestions,
};
use vitacheck_core::service::{CategorizationProvider, VitaService};

use super::helpers::{fail, print_supplement_table};

pub(crate) fn cmd_supplement_add(
    svc: &VitaService,
    provider: Option<&dyn CategorizationProvider>,
    name: &str,
    dosage: &str,
    relation: Option<&str>,
    period: Option<&str>,
    json: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Supplement name must not be empty");
    }
    let mut relation = relation.map(str::parse::<Relation>).transpose()?;
    let mut period = period.map(str::parse::<Period>).transpose()?;
    let mut reasoning = None;

    // Explicit --relation/--period win over the suggestion
    if let Some(provider) = provider {
        match svc.suggest_categories(provider, name) {
            Ok(suggestion) => {
                if !json {
                    eprintln!(
                        "Suggested: {}, {}",
                        suggestion.relation.label(),
                        suggestion.period.label()
                    );
                }
                relation.get_or_insert(suggestion.relation);
                period.get_or_insert(suggestion.period);
                reasoning = suggestion.reasoning;
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    let new = NewSupplement {
        name: name.to_string(),
        dosage: dosage.trim().to_string(),
        reasoning,
        relation: relation.unwrap_or(Relation::Before),
        period: period.unwrap_or(Period::Morning),
    };

    let supplement = match svc.add_supplement(&new) {
        Ok(s) => s,
        Err(e) if e.to_string() == DUPLICATE_SUPPLEMENT => fail(json, DUPLICATE_SUPPLEMENT),
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&supplement)?);
    } else {
        println!(
            "Added {} ({}), {}, {} (id: {})",
            supplement.name,
            supplement.dosage,
            supplement.relation.label(),
            supplement.period.label(),
            supplement.id
        );
        if let Some(ref why) = supplement.reasoning {
            println!("  Why: {why}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_supplement_list(svc: &VitaService, json: bool) -> Result<()> {
    let supplements = svc.list_supplements()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&supplements)?);
        return Ok(());
    }

    if supplements.is_empty() {
        eprintln!("No supplements yet. Add one with `vitacheck supplement add`");
        process::exit(2);
    }

    print_supplement_table(&supplements);
    Ok(())
}

pub(crate) fn cmd_supplement_remove(svc: &VitaService, id: &str, json: bool) -> Result<()> {
    if !svc.remove_supplement(id)? {
        fail(json, &format!("Supplement {id} not found"));
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Removed supplement {id}");
    }
    Ok(())
}

pub(crate) fn cmd_supplement_clear(svc: &VitaService, yes: bool, json: bool) -> Result<()> {
    if !yes {
        bail!("This removes every supplement. Re-run with --yes to confirm");
    }

    let removed = svc.clear_supplements()?;
    if json {
        println!("{}", serde_json::json!({ "deleted": removed }));
    } else {
        println!("Removed {removed} supplements");
    }
    Ok(())
}

pub(crate) fn cmd_supplement_suggest(input: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct SuggestionRow {
        #[tabled(rename = "Name")]
        name: &'static str,
        #[tabled(rename = "Typical dosage")]
        dosage: &'static str,
    }

    let matches = filter_suggestions(input, COMMON_SUPPLEMENTS);

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        eprintln!("No suggestions for '{input}'");
        process::exit(2);
    }

    let rows: Vec<SuggestionRow> = matches
        .iter()
        .map(|cs| SuggestionRow {
            name: cs.name,
            dosage: cs.dosage,
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
