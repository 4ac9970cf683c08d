use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vitacheck_core::error::CoreError;
use vitacheck_core::gateway::LocalNotificationQueue;
use vitacheck_core::models::{Period, TimeOfDay};
use vitacheck_core::scheduler::EXPANSION_DAYS;
use vitacheck_core::service::VitaService;

use super::helpers::fail;

/// Alarm state joined with what is still queued for it.
#[derive(Debug, Serialize)]
struct AlarmStatus {
    period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<TimeOfDay>,
    pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<NaiveDateTime>,
}

pub(crate) fn cmd_alarm_set(
    svc: &VitaService,
    gateway: &LocalNotificationQueue<'_>,
    period: &str,
    time: &str,
    json: bool,
) -> Result<()> {
    let period: Period = period.parse()?;
    let time: TimeOfDay = time.parse()?;

    let outcome = match svc.set_alarm(gateway, period, time) {
        Ok(outcome) => outcome,
        Err(e @ CoreError::PermissionDenied) => fail(json, &e.to_string()),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.recurring {
        println!("{} alarm set for {time}, every day", period.label());
    } else {
        let installed = outcome.installed;
        println!(
            "{} alarm set for {time}: {installed} reminder(s) over the next {EXPANSION_DAYS} days",
            period.label()
        );
        println!("  Set it again once they have fired to keep being reminded");
    }
    Ok(())
}

pub(crate) fn cmd_alarm_cancel(
    svc: &VitaService,
    gateway: &LocalNotificationQueue<'_>,
    period: &str,
    json: bool,
) -> Result<()> {
    let period: Period = period.parse()?;
    let cancelled = svc.cancel_alarm(gateway, period)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "period": period, "cancelled": cancelled })
        );
    } else {
        println!(
            "Cancelled {} alarm ({cancelled} notification(s) removed)",
            period.label().to_lowercase()
        );
    }
    Ok(())
}

pub(crate) fn cmd_alarm_show(
    svc: &VitaService,
    gateway: &LocalNotificationQueue<'_>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct AlarmRow {
        #[tabled(rename = "Period")]
        period: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Pending")]
        pending: usize,
        #[tabled(rename = "Next")]
        next: String,
    }

    let now = svc.now();
    let queued = gateway.pending()?;
    let statuses: Vec<AlarmStatus> = svc
        .alarms(gateway)?
        .into_iter()
        .map(|alarm| {
            let owned: Vec<_> = queued
                .iter()
                .filter(|n| alarm.notification_ids.contains(&n.id))
                .collect();
            AlarmStatus {
                period: alarm.period,
                time: alarm.time,
                pending: owned.len(),
                next: owned
                    .iter()
                    .filter_map(|n| n.trigger.next_occurrence(now))
                    .min(),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let rows: Vec<AlarmRow> = statuses
        .iter()
        .map(|s| AlarmRow {
            period: s.period.label().to_string(),
            time: s.time.map_or("-".into(), |t| t.to_string()),
            pending: s.pending,
            next: match (s.time, s.next) {
                (_, Some(next)) => next.format("%Y-%m-%d %H:%M").to_string(),
                (Some(_), None) => "expired, set it again".to_string(),
                (None, None) => "-".to_string(),
            },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}
