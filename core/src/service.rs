use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;

use crate::categorize::{
    AI_UNAVAILABLE, CategorizeResponse, CategorySuggestion, suggestion_from_response,
};
use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{NotificationGateway, Permission};
use crate::ledger::IntakeLedger;
use crate::models::{
    AlarmConfig, AlarmOutcome, IntakeItem, IntakeStore, NewSupplement, PERIODS, Period, PeriodView,
    Supplement, TakenMap, TimeOfDay, TodayView, validate_new_supplement,
};
use crate::scheduler::{HostCapability, ReminderScheduler, ScheduleStrategy};

/// Platform-native supplement categorization.
///
/// The CLI implements this with reqwest; mobile hosts with their own HTTP
/// stacks. Called synchronously, mobile callers should invoke `VitaService`
/// methods from a background thread.
pub trait CategorizationProvider: Send + Sync {
    fn categorize(&self, supplement_name: &str) -> Result<CategorizeResponse>;
}

pub struct VitaService {
    db: Database,
    clock: Box<dyn Clock>,
    strategy: Box<dyn ScheduleStrategy>,
}

impl VitaService {
    pub fn new(db_path: &str, capability: HostCapability) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self::from_database(db, capability))
    }

    pub fn new_in_memory(capability: HostCapability) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, capability))
    }

    #[must_use]
    pub fn from_database(db: Database, capability: HostCapability) -> Self {
        Self {
            db,
            clock: Box::new(SystemClock),
            strategy: capability.strategy(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.strategy.is_recurring()
    }

    fn ledger(&self) -> IntakeLedger<'_> {
        IntakeLedger::new(&self.db, &self.db, self.clock.as_ref())
    }

    fn scheduler<'a>(&'a self, gateway: &'a dyn NotificationGateway) -> ReminderScheduler<'a> {
        ReminderScheduler::new(
            &self.db,
            gateway,
            self.strategy.as_ref(),
            self.clock.as_ref(),
        )
    }

    // --- Catalog ---

    pub fn list_supplements(&self) -> Result<Vec<Supplement>> {
        self.db.list_supplements()
    }

    pub fn add_supplement(&self, new: &NewSupplement) -> Result<Supplement> {
        let existing = self.db.list_supplements()?;
        validate_new_supplement(new, &existing)?;
        let supplement = self.db.insert_supplement(new)?;
        self.reconcile();
        Ok(supplement)
    }

    pub fn remove_supplement(&self, id: &str) -> Result<bool> {
        let removed = self.db.delete_supplement(id)?;
        if removed {
            self.reconcile();
        }
        Ok(removed)
    }

    pub fn clear_supplements(&self) -> Result<usize> {
        let removed = self.db.clear_supplements()?;
        self.reconcile();
        Ok(removed)
    }

    /// Resync today's snapshot after a catalog write. The catalog change is
    /// already committed, so a failure here is logged rather than returned;
    /// the snapshot catches up on the next catalog change.
    fn reconcile(&self) {
        let result = self
            .db
            .list_supplements()
            .map_err(|e| CoreError::storage(&e))
            .and_then(|catalog| self.ledger().reconcile_catalog(&catalog));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to resync today's intake snapshot");
        }
    }

    pub fn suggest_categories(
        &self,
        provider: &dyn CategorizationProvider,
        name: &str,
    ) -> Result<CategorySuggestion> {
        match provider.categorize(name) {
            Ok(resp) => Ok(suggestion_from_response(resp)),
            Err(e) => {
                tracing::warn!(
                    supplement = name,
                    error = %format!("{e:#}"),
                    "categorization failed"
                );
                bail!(AI_UNAVAILABLE)
            }
        }
    }

    // --- Intake ledger ---

    /// Today's supplements grouped by period, with their taken flags.
    pub fn today_view(&self) -> Result<TodayView> {
        let ledger = self.ledger();
        let record = ledger.today()?;
        let catalog = self.db.list_supplements()?;

        let periods = PERIODS
            .iter()
            .map(|&period| {
                let items: Vec<IntakeItem> = catalog
                    .iter()
                    .filter(|s| s.period == period)
                    .map(|s| IntakeItem {
                        id: s.id.clone(),
                        name: s.name.clone(),
                        dosage: s.dosage.clone(),
                        relation: s.relation,
                        taken: record.is_taken(&s.id),
                    })
                    .collect();
                PeriodView {
                    period,
                    all_taken: !items.is_empty() && items.iter().all(|i| i.taken),
                    items,
                }
            })
            .collect();

        Ok(TodayView {
            date: ledger.today_key(),
            periods,
        })
    }

    pub fn taken_map(&self) -> Result<TakenMap> {
        Ok(self.ledger().get_taken_map()?)
    }

    /// Flip the flag of a catalog supplement. `None` when `id` is not in the
    /// catalog, in which case the ledger is left untouched.
    pub fn toggle(&self, id: &str) -> Result<Option<(Supplement, TakenMap)>> {
        let Some(supplement) = self.db.get_supplement(id)? else {
            return Ok(None);
        };
        let taken = self.ledger().toggle(id)?;
        Ok(Some((supplement, taken)))
    }

    pub fn set_many(&self, ids: &[String], value: bool) -> Result<TakenMap> {
        Ok(self.ledger().set_many(ids, value)?)
    }

    pub fn mark_period(&self, period: Period) -> Result<(bool, TakenMap)> {
        Ok(self.ledger().mark_period(period)?)
    }

    /// Stored days, oldest first, limited to the most recent `days` if given.
    pub fn history(&self, days: Option<usize>) -> Result<IntakeStore> {
        let mut store = self.ledger().history()?;
        if let Some(days) = days {
            let skip = store.len().saturating_sub(days);
            store = store.into_iter().skip(skip).collect();
        }
        Ok(store)
    }

    // --- Reminders ---

    pub fn request_permission(&self, gateway: &dyn NotificationGateway) -> CoreResult<Permission> {
        self.scheduler(gateway).request_capability()
    }

    pub fn set_alarm(
        &self,
        gateway: &dyn NotificationGateway,
        period: Period,
        time: TimeOfDay,
    ) -> CoreResult<AlarmOutcome> {
        self.scheduler(gateway).set_alarm(period, time)
    }

    pub fn cancel_alarm(
        &self,
        gateway: &dyn NotificationGateway,
        period: Period,
    ) -> CoreResult<usize> {
        self.scheduler(gateway).cancel_alarm(period)
    }

    pub fn alarms(&self, gateway: &dyn NotificationGateway) -> CoreResult<Vec<AlarmConfig>> {
        self.scheduler(gateway).alarms()
    }
}
