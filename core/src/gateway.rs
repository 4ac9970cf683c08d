use anyhow::{Result, bail};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires every day at the given local time.
    Recurring { hour: u32, minute: u32 },
    /// Fires once at the given local date and time.
    OneShot { at: NaiveDateTime },
}

impl Trigger {
    /// Latest instant at or before `now` at which this trigger fired.
    #[must_use]
    pub fn last_occurrence(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Trigger::Recurring { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let today = now.date().and_time(time);
                if today <= now {
                    Some(today)
                } else {
                    Some(today - Duration::days(1))
                }
            }
            Trigger::OneShot { at } => (at <= now).then_some(at),
        }
    }

    /// Earliest instant strictly after `now` at which this trigger fires.
    #[must_use]
    pub fn next_occurrence(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Trigger::Recurring { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let today = now.date().and_time(time);
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            Trigger::OneShot { at } => (at > now).then_some(at),
        }
    }
}

/// Entry returned by [`NotificationGateway::list_scheduled`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub title: String,
}

/// Host notification primitives.
///
/// Mobile hosts implement this over their OS notification APIs; the CLI uses
/// [`LocalNotificationQueue`]. Calls are synchronous, callers that must keep a
/// UI thread responsive should invoke scheduler operations from a background
/// thread.
pub trait NotificationGateway {
    fn request_permission(&self) -> Result<Permission>;
    fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>>;
    fn schedule(&self, content: &NotificationContent, trigger: &Trigger) -> Result<String>;
    fn cancel(&self, id: &str) -> Result<()>;
}

/// Row of the local notification queue.
#[derive(Debug, Clone, Serialize)]
pub struct StoredNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub trigger: Trigger,
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<NaiveDateTime>,
}

impl StoredNotification {
    /// Occurrence that has come due since the notification was created or
    /// last delivered, if any.
    #[must_use]
    pub fn due_at(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let occurrence = self.trigger.last_occurrence(now)?;
        let watermark = self.last_fired_at.unwrap_or(self.created_at);
        let seen = match self.trigger {
            // A one-shot set for the instant it was created still fires once
            Trigger::OneShot { .. } => self.last_fired_at.is_some_and(|f| occurrence <= f),
            Trigger::Recurring { .. } => occurrence <= watermark,
        };
        (!seen).then_some(occurrence)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveredNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fired_at: NaiveDateTime,
}

/// Notification host backed by the `scheduled_notifications` table.
///
/// Stands in for the OS queue on desktop: it supports native daily
/// recurrence, and `due` plays the role of the OS delivering notifications.
pub struct LocalNotificationQueue<'a> {
    db: &'a Database,
    permission: Permission,
    now: NaiveDateTime,
}

impl<'a> LocalNotificationQueue<'a> {
    #[must_use]
    pub fn new(db: &'a Database, permission: Permission, now: NaiveDateTime) -> Self {
        Self {
            db,
            permission,
            now,
        }
    }

    pub fn pending(&self) -> Result<Vec<StoredNotification>> {
        self.db.list_notifications()
    }

    /// Deliver everything due at `now`. One-shot notifications are removed
    /// once delivered; recurring ones stay and remember the delivery.
    pub fn due(&self, now: NaiveDateTime) -> Result<Vec<DeliveredNotification>> {
        let mut delivered = Vec::new();
        for n in self.db.list_notifications()? {
            let Some(fired_at) = n.due_at(now) else {
                continue;
            };
            match n.trigger {
                Trigger::OneShot { .. } => {
                    self.db.delete_notification(&n.id)?;
                }
                Trigger::Recurring { .. } => {
                    self.db.mark_notification_fired(&n.id, now)?;
                }
            }
            delivered.push(DeliveredNotification {
                id: n.id,
                title: n.title,
                body: n.body,
                fired_at,
            });
        }
        Ok(delivered)
    }
}

impl NotificationGateway for LocalNotificationQueue<'_> {
    fn request_permission(&self) -> Result<Permission> {
        Ok(self.permission)
    }

    fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        Ok(self
            .db
            .list_notifications()?
            .into_iter()
            .map(|n| ScheduledNotification {
                id: n.id,
                title: n.title,
            })
            .collect())
    }

    fn schedule(&self, content: &NotificationContent, trigger: &Trigger) -> Result<String> {
        if self.permission == Permission::Denied {
            bail!("Notifications are not permitted on this host");
        }
        if let Trigger::Recurring { hour, minute } = *trigger {
            if NaiveTime::from_hms_opt(hour, minute, 0).is_none() {
                bail!("Invalid recurring trigger {hour:02}:{minute:02}");
            }
        }
        self.db.insert_notification(content, trigger, self.now)
    }

    fn cancel(&self, id: &str) -> Result<()> {
        self.db.delete_notification(id)?;
        Ok(())
    }
}
