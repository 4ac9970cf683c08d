//! Date-partitioned record of which supplements were taken.
//!
//! The whole ledger lives in one JSON blob under [`LEDGER_KEY`]. Every
//! mutation goes through [`KeyValueStore::update`]: read the blob, change
//! today's entry, write the blob back.

use std::collections::btree_map::Entry;

use anyhow::Result;

use crate::clock::{Clock, date_key};
use crate::error::{CoreError, CoreResult};
use crate::models::{DailyIntakeRecord, IntakeStore, Period, SnapshotEntry, Supplement, TakenMap};
use crate::storage::{KeyValueStore, SupplementCatalog};

pub const LEDGER_KEY: &str = "dailyIntake";

/// Value a "mark all" action applies to every id in `ids`: `false` when all of
/// them are already taken, `true` otherwise.
#[must_use]
pub fn mark_all_target(taken: &TakenMap, ids: &[String]) -> bool {
    !ids.iter().all(|id| taken.get(id).copied().unwrap_or(false))
}

fn parse_store(raw: Option<&str>) -> IntakeStore {
    let Some(raw) = raw else {
        return IntakeStore::new();
    };
    match serde_json::from_str(raw) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "intake ledger is corrupt, treating it as empty");
            IntakeStore::new()
        }
    }
}

/// Whether the stored record for `date` exists but carries no `supplements`
/// key at all. An explicit empty list is a real snapshot and does not count.
fn snapshot_missing(raw: Option<&str>, date: &str) -> bool {
    raw.and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .and_then(|store| {
            store
                .get(date)
                .map(|record| record.get("supplements").is_none())
        })
        .unwrap_or(false)
}

/// Today's intake flags over a [`KeyValueStore`].
///
/// Every operation is synchronous and does blocking storage I/O. Hosts that
/// must keep a UI thread responsive should call it from a background thread.
pub struct IntakeLedger<'a> {
    store: &'a dyn KeyValueStore,
    catalog: &'a dyn SupplementCatalog,
    clock: &'a dyn Clock,
}

impl<'a> IntakeLedger<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn KeyValueStore,
        catalog: &'a dyn SupplementCatalog,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
        }
    }

    #[must_use]
    pub fn today_key(&self) -> String {
        date_key(self.clock.today())
    }

    fn raw(&self) -> CoreResult<Option<String>> {
        self.store
            .get(LEDGER_KEY)
            .map_err(|e| CoreError::storage(&e))
    }

    /// Every stored day, oldest first. Does not create today's record.
    pub fn history(&self) -> CoreResult<IntakeStore> {
        Ok(parse_store(self.raw()?.as_deref()))
    }

    /// Today's record, created from the live catalog if this is the first
    /// access of the day. A stored record without a snapshot gets one too.
    pub fn today(&self) -> CoreResult<DailyIntakeRecord> {
        let key = self.today_key();
        let raw = self.raw()?;
        match parse_store(raw.as_deref()).remove(&key) {
            Some(record) if !snapshot_missing(raw.as_deref(), &key) => Ok(record),
            _ => self.update_today(|_| Ok(())),
        }
    }

    pub fn get_taken_map(&self) -> CoreResult<TakenMap> {
        Ok(self.today()?.taken)
    }

    /// Flip one supplement's flag for today. A missing flag counts as not taken.
    pub fn toggle(&self, id: &str) -> CoreResult<TakenMap> {
        let record = self.update_today(|record| {
            let flag = record.taken.entry(id.to_string()).or_insert(false);
            *flag = !*flag;
            Ok(())
        })?;
        Ok(record.taken)
    }

    /// Set every id in `ids` to `value`, regardless of its current state.
    pub fn set_many(&self, ids: &[String], value: bool) -> CoreResult<TakenMap> {
        let record = self.update_today(|record| {
            for id in ids {
                record.taken.insert(id.clone(), value);
            }
            Ok(())
        })?;
        Ok(record.taken)
    }

    /// Apply [`mark_all_target`] to `ids` and return the value applied with the
    /// resulting map.
    pub fn mark_all(&self, ids: &[String]) -> CoreResult<(bool, TakenMap)> {
        let target = mark_all_target(&self.get_taken_map()?, ids);
        let taken = self.set_many(ids, target)?;
        Ok((target, taken))
    }

    /// Mark-all over every catalog supplement in `period`.
    pub fn mark_period(&self, period: Period) -> CoreResult<(bool, TakenMap)> {
        let ids: Vec<String> = self
            .catalog
            .list()
            .map_err(|e| CoreError::storage(&e))?
            .into_iter()
            .filter(|s| s.period == period)
            .map(|s| s.id)
            .collect();
        self.mark_all(&ids)
    }

    /// Resync today's snapshot with `catalog`. Flags are left alone, including
    /// those of supplements that are no longer in the catalog.
    pub fn reconcile_catalog(&self, catalog: &[Supplement]) -> CoreResult<DailyIntakeRecord> {
        self.update_today(|record| {
            record.supplements = catalog.iter().map(SnapshotEntry::from).collect();
            Ok(())
        })
    }

    fn update_today<F>(&self, mut edit: F) -> CoreResult<DailyIntakeRecord>
    where
        F: FnMut(&mut DailyIntakeRecord) -> Result<()>,
    {
        let key = self.today_key();
        let mut updated = None;
        self.store
            .update(LEDGER_KEY, &mut |raw| {
                let missing = snapshot_missing(raw.as_deref(), &key);
                let mut store = parse_store(raw.as_deref());
                let record = match store.entry(key.clone()) {
                    Entry::Occupied(e) => {
                        let record = e.into_mut();
                        if missing {
                            let catalog = self.catalog.list()?;
                            tracing::debug!(
                                date = %key,
                                supplements = catalog.len(),
                                "filling missing intake snapshot"
                            );
                            record.supplements = catalog.iter().map(SnapshotEntry::from).collect();
                        }
                        record
                    }
                    Entry::Vacant(e) => {
                        let catalog = self.catalog.list()?;
                        tracing::debug!(
                            date = %key,
                            supplements = catalog.len(),
                            "creating daily intake record"
                        );
                        e.insert(DailyIntakeRecord::from_catalog(&catalog))
                    }
                };
                edit(record)?;
                updated = Some(record.clone());
                Ok(serde_json::to_string(&store)?)
            })
            .map_err(|e| CoreError::storage(&e))?;
        updated.ok_or_else(|| CoreError::Storage("intake ledger update did not run".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::Database;
    use crate::models::{NewSupplement, Relation};

    fn add(db: &Database, name: &str, period: Period) -> Supplement {
        db.insert_supplement(&NewSupplement {
            name: name.to_string(),
            dosage: "1 capsule".to_string(),
            reasoning: None,
            relation: Relation::With,
            period,
        })
        .unwrap()
    }

    fn clock(date: &str) -> FixedClock {
        FixedClock::at(date, "09:00").unwrap()
    }

    fn stored(db: &Database) -> IntakeStore {
        serde_json::from_str(&db.get_setting(LEDGER_KEY).unwrap().unwrap()).unwrap()
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("disk I/O error")
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("disk I/O error")
        }
        fn remove(&self, _key: &str) -> Result<bool> {
            anyhow::bail!("disk I/O error")
        }
        fn update(
            &self,
            _key: &str,
            _apply: &mut dyn FnMut(Option<String>) -> Result<String>,
        ) -> Result<()> {
            anyhow::bail!("disk I/O error")
        }
    }

    #[test]
    fn test_first_read_creates_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let d3 = add(&db, "D3", Period::Morning);
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        assert!(ledger.get_taken_map().unwrap().is_empty());

        let store = stored(&db);
        let record = &store["2024-01-01"];
        assert_eq!(
            record.supplements,
            vec![SnapshotEntry {
                id: d3.id.clone(),
                name: "D3".to_string()
            }]
        );
        assert!(record.taken.is_empty());

        let ids = ledger.toggle(&d3.id).unwrap();
        assert_eq!(ids.get(&d3.id), Some(&true));
        let ids = ledger.toggle(&d3.id).unwrap();
        assert_eq!(ids.get(&d3.id), Some(&false));
    }

    #[test]
    fn test_get_taken_map_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let s = add(&db, "Zinc", Period::Noon);
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        ledger.toggle(&s.id).unwrap();
        let first = ledger.get_taken_map().unwrap();
        let second = ledger.get_taken_map().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.get(&s.id), Some(&true));
    }

    #[test]
    fn test_toggle_parity() {
        let db = Database::open_in_memory().unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        for n in 1..=5 {
            let taken = ledger.toggle("x").unwrap();
            assert_eq!(taken["x"], n % 2 == 1);
        }
    }

    #[test]
    fn test_set_many_is_unconditional() {
        let db = Database::open_in_memory().unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        ledger.toggle("b").unwrap();
        let taken = ledger.set_many(&ids, true).unwrap();
        assert!(ids.iter().all(|id| taken[id]));

        let taken = ledger.set_many(&ids, false).unwrap();
        assert!(ids.iter().all(|id| !taken[id]));
    }

    #[test]
    fn test_mark_all_target() {
        let mut taken = TakenMap::new();
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(mark_all_target(&taken, &ids));

        taken.insert("a".to_string(), true);
        assert!(mark_all_target(&taken, &ids));

        taken.insert("b".to_string(), true);
        assert!(!mark_all_target(&taken, &ids));

        taken.insert("b".to_string(), false);
        assert!(mark_all_target(&taken, &ids));

        // Vacuously all taken
        assert!(!mark_all_target(&taken, &[]));
    }

    #[test]
    fn test_mark_all_marks_then_unmarks() {
        let db = Database::open_in_memory().unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);
        let ids = vec!["a".to_string(), "b".to_string()];

        ledger.toggle("a").unwrap();
        let (target, taken) = ledger.mark_all(&ids).unwrap();
        assert!(target);
        assert!(taken["a"] && taken["b"]);

        let (target, taken) = ledger.mark_all(&ids).unwrap();
        assert!(!target);
        assert!(!taken["a"] && !taken["b"]);
    }

    #[test]
    fn test_mark_period_only_touches_that_period() {
        let db = Database::open_in_memory().unwrap();
        let m1 = add(&db, "D3", Period::Morning);
        let m2 = add(&db, "K2", Period::Morning);
        let e1 = add(&db, "Magnesium", Period::Evening);
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        let (target, taken) = ledger.mark_period(Period::Morning).unwrap();
        assert!(target);
        assert!(taken[&m1.id] && taken[&m2.id]);
        assert!(!taken.contains_key(&e1.id));
    }

    #[test]
    fn test_reconcile_keeps_flags_and_orphans() {
        let db = Database::open_in_memory().unwrap();
        let a = add(&db, "D3", Period::Morning);
        let b = add(&db, "Zinc", Period::Noon);
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        ledger.toggle(&a.id).unwrap();
        ledger.toggle(&b.id).unwrap();

        db.delete_supplement(&b.id).unwrap();
        let c = add(&db, "Iron", Period::Evening);
        let record = ledger.reconcile_catalog(&db.list_supplements().unwrap()).unwrap();

        let snapshot_ids: Vec<&str> = record.supplements.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(snapshot_ids, vec![a.id.as_str(), c.id.as_str()]);
        assert_eq!(record.taken.get(&a.id), Some(&true));
        // Removed supplement keeps its flag; the new one has none yet
        assert_eq!(record.taken.get(&b.id), Some(&true));
        assert!(!record.taken.contains_key(&c.id));
    }

    #[test]
    fn test_date_rollover() {
        let db = Database::open_in_memory().unwrap();
        let a = add(&db, "D3", Period::Morning);

        let day1 = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &day1);
        ledger.toggle(&a.id).unwrap();
        assert_eq!(ledger.get_taken_map().unwrap().get(&a.id), Some(&true));

        let day2 = clock("2024-01-02");
        let ledger = IntakeLedger::new(&db, &db, &day2);
        assert!(ledger.get_taken_map().unwrap().is_empty());

        let history = ledger.history().unwrap();
        let keys: Vec<&str> = history.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(history["2024-01-01"].taken.get(&a.id), Some(&true));
    }

    #[test]
    fn test_record_without_snapshot_gets_one() {
        let db = Database::open_in_memory().unwrap();
        let a = add(&db, "D3", Period::Morning);
        let b = add(&db, "Zinc", Period::Noon);
        db.set_setting(
            LEDGER_KEY,
            &format!(r#"{{"2024-01-01":{{"taken":{{"{}":true}}}}}}"#, a.id),
        )
        .unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        let record = ledger.today().unwrap();
        let snapshot_ids: Vec<&str> = record.supplements.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(snapshot_ids, vec![a.id.as_str(), b.id.as_str()]);
        assert!(record.is_taken(&a.id));

        // Filled once, then left alone
        assert_eq!(stored(&db)["2024-01-01"].supplements.len(), 2);
        db.delete_supplement(&b.id).unwrap();
        ledger.toggle(&b.id).unwrap();
        assert_eq!(stored(&db)["2024-01-01"].supplements.len(), 2);
    }

    #[test]
    fn test_toggle_fills_missing_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let a = add(&db, "D3", Period::Morning);
        db.set_setting(LEDGER_KEY, r#"{"2024-01-01":{"taken":{}}}"#)
            .unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        ledger.toggle(&a.id).unwrap();
        let record = &stored(&db)["2024-01-01"];
        assert_eq!(record.supplements.len(), 1);
        assert_eq!(record.supplements[0].id, a.id);
        assert!(record.is_taken(&a.id));
    }

    #[test]
    fn test_empty_snapshot_is_kept() {
        let db = Database::open_in_memory().unwrap();
        add(&db, "D3", Period::Morning);
        db.set_setting(LEDGER_KEY, r#"{"2024-01-01":{"taken":{},"supplements":[]}}"#)
            .unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        assert!(ledger.today().unwrap().supplements.is_empty());
        ledger.toggle("x").unwrap();
        assert!(stored(&db)["2024-01-01"].supplements.is_empty());
    }

    #[test]
    fn test_writers_on_separate_connections_keep_every_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitacheck.db");
        Database::open(&path).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let path = &path;
                scope.spawn(move || {
                    let db = Database::open(path).unwrap();
                    let clock = clock("2024-01-01");
                    let ledger = IntakeLedger::new(&db, &db, &clock);
                    for i in 0..25 {
                        ledger.toggle(&format!("t{t}-{i}")).unwrap();
                    }
                });
            }
        });

        let db = Database::open(&path).unwrap();
        let clock = clock("2024-01-01");
        let taken = IntakeLedger::new(&db, &db, &clock).get_taken_map().unwrap();
        assert_eq!(taken.len(), 100);
        assert!(taken.values().all(|v| *v));
    }

    #[test]
    fn test_history_does_not_create_today() {
        let db = Database::open_in_memory().unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);
        assert!(ledger.history().unwrap().is_empty());
        assert!(db.get_setting(LEDGER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_blob_treated_as_empty() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(LEDGER_KEY, "{not json").unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&db, &db, &clock);

        assert!(ledger.history().unwrap().is_empty());
        let taken = ledger.toggle("a").unwrap();
        assert_eq!(taken.get("a"), Some(&true));
        assert!(stored(&db).contains_key("2024-01-01"));
    }

    #[test]
    fn test_storage_failure_surfaces() {
        let db = Database::open_in_memory().unwrap();
        let clock = clock("2024-01-01");
        let ledger = IntakeLedger::new(&BrokenStore, &db, &clock);

        assert!(matches!(ledger.get_taken_map(), Err(CoreError::Storage(_))));
        assert!(matches!(ledger.toggle("a"), Err(CoreError::Storage(_))));
    }
}
