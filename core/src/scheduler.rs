//! Daily supplement reminders for the three fixed periods.
//!
//! Each period's intent (a time of day) is persisted next to the ids of the
//! notifications installed for it, so re-setting or cancelling removes exactly
//! what was installed. A title sweep on the period's phrase then clears any
//! notification left behind by an installer that did not record ids.
//!
//! Hosts without native daily recurrence get one-shot instances for the next
//! [`EXPANSION_DAYS`] days. Nothing renews them afterwards: once they have all
//! fired the reminder is silent until the alarm is set again.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Days, Local, NaiveDateTime, NaiveTime, Timelike};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{NotificationContent, NotificationGateway, Permission, Trigger};
use crate::models::{AlarmConfig, AlarmOutcome, PERIODS, Period, TimeOfDay};
use crate::storage::KeyValueStore;

pub const EXPANSION_DAYS: u64 = 7;

const REMINDER_BODY: &str = "Don't forget to mark them as taken.";

/// What the notification host can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostCapability {
    /// Daily repeating triggers are supported.
    #[default]
    RecurringCapable,
    /// Only one-shot triggers at a fixed instant.
    InstanceOnly,
}

impl HostCapability {
    #[must_use]
    pub fn strategy(self) -> Box<dyn ScheduleStrategy> {
        match self {
            HostCapability::RecurringCapable => Box::new(RecurringDaily),
            HostCapability::InstanceOnly => Box::new(InstanceExpansion {
                days: EXPANSION_DAYS,
            }),
        }
    }
}

impl fmt::Display for HostCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCapability::RecurringCapable => f.write_str("recurring"),
            HostCapability::InstanceOnly => f.write_str("instance"),
        }
    }
}

impl FromStr for HostCapability {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recurring" => Ok(HostCapability::RecurringCapable),
            "instance" | "instance-only" => Ok(HostCapability::InstanceOnly),
            _ => bail!("Invalid host capability '{s}'. Use 'recurring' or 'instance'"),
        }
    }
}

/// Turns a time of day into the triggers to install.
pub trait ScheduleStrategy {
    fn plan(&self, time: TimeOfDay, now: NaiveDateTime) -> Vec<Trigger>;

    fn is_recurring(&self) -> bool;
}

pub struct RecurringDaily;

impl ScheduleStrategy for RecurringDaily {
    fn plan(&self, time: TimeOfDay, _now: NaiveDateTime) -> Vec<Trigger> {
        vec![Trigger::Recurring {
            hour: time.hour,
            minute: time.minute,
        }]
    }

    fn is_recurring(&self) -> bool {
        true
    }
}

/// One-shot instances for `days` consecutive days starting today. Today's
/// instance is skipped when its time is not in the future.
pub struct InstanceExpansion {
    pub days: u64,
}

impl ScheduleStrategy for InstanceExpansion {
    fn plan(&self, time: TimeOfDay, now: NaiveDateTime) -> Vec<Trigger> {
        let Some(at) = NaiveTime::from_hms_opt(time.hour, time.minute, 0) else {
            return Vec::new();
        };
        (0..self.days)
            .filter_map(|offset| now.date().checked_add_days(Days::new(offset)))
            .map(|date| date.and_time(at))
            .filter(|instant| *instant > now)
            .map(|at| Trigger::OneShot { at })
            .collect()
    }

    fn is_recurring(&self) -> bool {
        false
    }
}

#[must_use]
pub fn reminder_content(period: Period) -> NotificationContent {
    NotificationContent {
        title: format!("Time to take your {}!", period.phrase()),
        body: REMINDER_BODY.to_string(),
    }
}

fn format_alarm_time(date: NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Accepts naive local ISO-8601 and RFC 3339 (converted to local time).
fn parse_alarm_time(raw: &str) -> Option<TimeOfDay> {
    let local = raw.parse::<NaiveDateTime>().ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Local).naive_local())
    })?;
    Some(TimeOfDay {
        hour: local.hour(),
        minute: local.minute(),
    })
}

/// Per-period daily reminders installed through a [`NotificationGateway`].
///
/// Every operation is synchronous: it does blocking storage I/O and calls the
/// gateway inline. Hosts that must keep a UI thread responsive should call it
/// from a background thread.
pub struct ReminderScheduler<'a> {
    store: &'a dyn KeyValueStore,
    gateway: &'a dyn NotificationGateway,
    strategy: &'a dyn ScheduleStrategy,
    clock: &'a dyn Clock,
}

impl<'a> ReminderScheduler<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn KeyValueStore,
        gateway: &'a dyn NotificationGateway,
        strategy: &'a dyn ScheduleStrategy,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            gateway,
            strategy,
            clock,
        }
    }

    pub fn request_capability(&self) -> CoreResult<Permission> {
        self.gateway
            .request_permission()
            .map_err(|e| CoreError::gateway(&e))
    }

    /// Replace the period's reminder with one at `time`.
    ///
    /// The time is persisted before the notifications are installed. If the
    /// host then fails, the time stays persisted with fewer (possibly zero)
    /// notifications behind it; the ids that did get installed are still
    /// recorded.
    pub fn set_alarm(&self, period: Period, time: TimeOfDay) -> CoreResult<AlarmOutcome> {
        if self.request_capability()? == Permission::Denied {
            tracing::info!(%period, "notification permission denied, alarm not set");
            return Err(CoreError::PermissionDenied);
        }

        self.clear_schedule(period)?;

        let now = self.clock.now();
        let Some(at) = NaiveTime::from_hms_opt(time.hour, time.minute, 0) else {
            return Err(CoreError::Gateway(format!("invalid time of day {time}")));
        };
        self.store
            .set(period.alarm_time_key(), &format_alarm_time(now.date().and_time(at)))
            .map_err(|e| CoreError::storage(&e))?;

        let content = reminder_content(period);
        let mut installed = Vec::new();
        for trigger in self.strategy.plan(time, now) {
            match self.gateway.schedule(&content, &trigger) {
                Ok(id) => installed.push(id),
                Err(e) => {
                    tracing::warn!(
                        %period,
                        installed = installed.len(),
                        error = %e,
                        "scheduling failed after the alarm time was saved"
                    );
                    self.save_ids(period, &installed)?;
                    return Err(CoreError::gateway(&e));
                }
            }
        }
        self.save_ids(period, &installed)?;

        tracing::info!(%period, %time, installed = installed.len(), "alarm set");
        Ok(AlarmOutcome {
            period,
            time,
            installed: installed.len(),
            recurring: self.strategy.is_recurring(),
        })
    }

    /// Remove the period's notifications and forget its time. Returns the
    /// number of notifications cancelled.
    pub fn cancel_alarm(&self, period: Period) -> CoreResult<usize> {
        let cancelled = self.clear_schedule(period)?;
        self.store
            .remove(period.alarm_time_key())
            .map_err(|e| CoreError::storage(&e))?;
        tracing::info!(%period, cancelled, "alarm cancelled");
        Ok(cancelled)
    }

    pub fn alarm(&self, period: Period) -> CoreResult<AlarmConfig> {
        let raw = self
            .store
            .get(period.alarm_time_key())
            .map_err(|e| CoreError::storage(&e))?;
        let time = raw.as_deref().and_then(|raw| {
            let parsed = parse_alarm_time(raw);
            if parsed.is_none() {
                tracing::warn!(%period, value = raw, "ignoring unreadable alarm time");
            }
            parsed
        });
        Ok(AlarmConfig {
            period,
            time,
            notification_ids: self.owned_ids(period)?,
        })
    }

    pub fn alarms(&self) -> CoreResult<Vec<AlarmConfig>> {
        PERIODS.iter().map(|&p| self.alarm(p)).collect()
    }

    fn owned_ids(&self, period: Period) -> CoreResult<Vec<String>> {
        let raw = self
            .store
            .get(period.alarm_ids_key())
            .map_err(|e| CoreError::storage(&e))?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(%period, error = %e, "ignoring unreadable alarm ids");
            Vec::new()
        }))
    }

    fn save_ids(&self, period: Period, ids: &[String]) -> CoreResult<()> {
        let result = if ids.is_empty() {
            self.store.remove(period.alarm_ids_key()).map(|_| ())
        } else {
            serde_json::to_string(ids)
                .map_err(anyhow::Error::from)
                .and_then(|json| self.store.set(period.alarm_ids_key(), &json))
        };
        result.map_err(|e| CoreError::storage(&e))
    }

    /// Cancel the period's recorded notifications plus any queued notification
    /// whose title carries the period's phrase.
    fn clear_schedule(&self, period: Period) -> CoreResult<usize> {
        let owned: HashSet<String> = self.owned_ids(period)?.into_iter().collect();
        let scheduled = self
            .gateway
            .list_scheduled()
            .map_err(|e| CoreError::gateway(&e))?;

        let mut cancelled = 0;
        for n in scheduled {
            if owned.contains(&n.id) || n.title.contains(period.phrase()) {
                self.gateway
                    .cancel(&n.id)
                    .map_err(|e| CoreError::gateway(&e))?;
                cancelled += 1;
            }
        }
        self.save_ids(period, &[])?;
        Ok(cancelled)
    }
}
