use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use crate::gateway::{NotificationContent, StoredNotification, Trigger};
use crate::models::{NewSupplement, Supplement};
use crate::storage::{KeyValueStore, SupplementCatalog};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS supplements (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    dosage TEXT NOT NULL DEFAULT '',
                    reasoning TEXT,
                    relation TEXT NOT NULL,
                    period TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_supplements_period ON supplements(period);

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS scheduled_notifications (
                    id TEXT PRIMARY KEY NOT NULL,
                    title TEXT NOT NULL,
                    body TEXT NOT NULL,
                    trigger TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    last_fired_at TEXT
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn supplement_from_row(row: &rusqlite::Row) -> rusqlite::Result<Supplement> {
        let relation: String = row.get(4)?;
        let period: String = row.get(5)?;
        Ok(Supplement {
            id: row.get(0)?,
            name: row.get(1)?,
            dosage: row.get(2)?,
            reasoning: row.get(3)?,
            relation: relation
                .parse()
                .map_err(|e: anyhow::Error| conversion_error(4, e))?,
            period: period
                .parse()
                .map_err(|e: anyhow::Error| conversion_error(5, e))?,
            created_at: row.get(6)?,
        })
    }

    fn notification_from_row(row: &rusqlite::Row) -> rusqlite::Result<StoredNotification> {
        let trigger: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        let last_fired_at: Option<String> = row.get(5)?;
        Ok(StoredNotification {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            trigger: serde_json::from_str(&trigger).map_err(|e| conversion_error(3, e.into()))?,
            created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(4, e))?,
            last_fired_at: last_fired_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .map_err(|e| conversion_error(5, e))?,
        })
    }

    // --- Supplements ---

    pub fn insert_supplement(&self, new: &NewSupplement) -> Result<Supplement> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO supplements (id, name, dosage, reasoning, relation, period, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                new.name,
                new.dosage,
                new.reasoning,
                new.relation.label(),
                new.period.label(),
                now
            ],
        )?;
        self.get_supplement(&id)?
            .with_context(|| format!("Supplement {id} vanished after insert"))
    }

    pub fn get_supplement(&self, id: &str) -> Result<Option<Supplement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, dosage, reasoning, relation, period, created_at
             FROM supplements WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::supplement_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_supplements(&self) -> Result<Vec<Supplement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, dosage, reasoning, relation, period, created_at
             FROM supplements ORDER BY seq",
        )?;
        let rows = stmt.query_map([], Self::supplement_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_supplement(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM supplements WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn clear_supplements(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM supplements", [])?)
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        write_setting(&self.conn, key, value)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        read_setting(&self.conn, key)
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Read-modify-write of one setting under `BEGIN IMMEDIATE`, so a second
    /// process waits for the first write instead of reading stale state.
    pub fn update_setting(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let current = read_setting(&tx, key)?;
        let next = apply(current)?;
        write_setting(&tx, key, &next)?;
        tx.commit()?;
        Ok(())
    }

    // --- Local notification queue ---

    pub fn insert_notification(
        &self,
        content: &NotificationContent,
        trigger: &Trigger,
        created_at: NaiveDateTime,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO scheduled_notifications (id, title, body, trigger, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                content.title,
                content.body,
                serde_json::to_string(trigger)?,
                format_timestamp(created_at)
            ],
        )?;
        Ok(id)
    }

    pub fn list_notifications(&self) -> Result<Vec<StoredNotification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, trigger, created_at, last_fired_at
             FROM scheduled_notifications ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], Self::notification_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM scheduled_notifications WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    pub fn mark_notification_fired(&self, id: &str, at: NaiveDateTime) -> Result<()> {
        self.conn.execute(
            "UPDATE scheduled_notifications SET last_fired_at = ?1 WHERE id = ?2",
            params![format_timestamp(at), id],
        )?;
        Ok(())
    }
}

fn read_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM user_settings WHERE key = ?1")?;
    let mut rows = stmt.query(params![key])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row.get(0)?))
    } else {
        Ok(None)
    }
}

fn write_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let now = Local::now().to_rfc3339();
    conn.execute(
        "INSERT INTO user_settings (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid timestamp '{s}'"))
}

fn conversion_error(idx: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_setting(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_setting(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.delete_setting(key)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()> {
        self.update_setting(key, apply)
    }
}

impl SupplementCatalog for Database {
    fn list(&self) -> Result<Vec<Supplement>> {
        self.list_supplements()
    }
}
