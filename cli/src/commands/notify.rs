use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use vitacheck_core::gateway::{LocalNotificationQueue, Trigger};
use vitacheck_core::service::VitaService;

use super::helpers::truncate;

fn describe(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Recurring { hour, minute } => format!("daily {hour:02}:{minute:02}"),
        Trigger::OneShot { at } => format!("once {}", at.format("%Y-%m-%d %H:%M")),
    }
}

pub(crate) fn cmd_notify_list(
    svc: &VitaService,
    gateway: &LocalNotificationQueue<'_>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct NotificationRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Trigger")]
        trigger: String,
        #[tabled(rename = "Next")]
        next: String,
    }

    let pending = gateway.pending()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        eprintln!("No notifications scheduled");
        return Ok(());
    }

    let now = svc.now();
    let rows: Vec<NotificationRow> = pending
        .iter()
        .map(|n| NotificationRow {
            id: n.id.clone(),
            title: truncate(&n.title, 45),
            trigger: describe(&n.trigger),
            next: n
                .trigger
                .next_occurrence(now)
                .map_or("-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

/// Deliver every notification that has come due, the way the OS would.
pub(crate) fn cmd_notify_fire(
    svc: &VitaService,
    gateway: &LocalNotificationQueue<'_>,
    json: bool,
) -> Result<()> {
    let delivered = gateway.due(svc.now())?;
    tracing::info!(count = delivered.len(), "delivered due notifications");

    if json {
        println!("{}", serde_json::to_string_pretty(&delivered)?);
        return Ok(());
    }

    if delivered.is_empty() {
        eprintln!("Nothing due");
        return Ok(());
    }

    for n in &delivered {
        println!("[{}] {}", n.fired_at.format("%Y-%m-%d %H:%M"), n.title);
        println!("    {}", n.body);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_describe_trigger() {
        assert_eq!(
            describe(&Trigger::Recurring { hour: 8, minute: 5 }),
            "daily 08:05"
        );
        let at = NaiveDateTime::parse_from_str("2024-01-02 20:00", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(describe(&Trigger::OneShot { at }), "once 2024-01-02 20:00");
    }
}
