use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// One of the three fixed daily reminder slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    Morning,
    Noon,
    Evening,
}

pub const PERIODS: &[Period] = &[Period::Morning, Period::Noon, Period::Evening];

impl Period {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Period::Morning => "Morning",
            Period::Noon => "Noon",
            Period::Evening => "Evening",
        }
    }

    /// Lowercase phrase carried by every reminder title for this period.
    #[must_use]
    pub fn phrase(self) -> &'static str {
        match self {
            Period::Morning => "morning supplements",
            Period::Noon => "noon supplements",
            Period::Evening => "evening supplements",
        }
    }

    /// Settings key holding the persisted alarm time.
    #[must_use]
    pub fn alarm_time_key(self) -> &'static str {
        match self {
            Period::Morning => "morningAlarmTime",
            Period::Noon => "noonAlarmTime",
            Period::Evening => "eveningAlarmTime",
        }
    }

    /// Settings key holding the ids of notifications installed for this period.
    #[must_use]
    pub fn alarm_ids_key(self) -> &'static str {
        match self {
            Period::Morning => "morningAlarmIds",
            Period::Noon => "noonAlarmIds",
            Period::Evening => "eveningAlarmIds",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(Period::Morning),
            "noon" => Ok(Period::Noon),
            "evening" => Ok(Period::Evening),
            _ => bail!("Invalid period '{s}'. Must be one of: morning, noon, evening"),
        }
    }
}

/// How a supplement relates to eating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "Before Eating")]
    Before,
    #[serde(rename = "With Food")]
    With,
    #[serde(rename = "After Eating")]
    After,
}

pub const RELATIONS: &[Relation] = &[Relation::Before, Relation::With, Relation::After];

impl Relation {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Relation::Before => "Before Eating",
            Relation::With => "With Food",
            Relation::After => "After Eating",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Relation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "before" | "before eating" => Ok(Relation::Before),
            "with" | "with food" => Ok(Relation::With),
            "after" | "after eating" => Ok(Relation::After),
            _ => bail!("Invalid relation '{s}'. Must be one of: before, with, after"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplement {
    pub id: String,
    pub name: String,
    pub dosage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub relation: Relation,
    pub period: Period,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSupplement {
    pub name: String,
    pub dosage: String,
    pub reasoning: Option<String>,
    pub relation: Relation,
    pub period: Period,
}

pub const DUPLICATE_SUPPLEMENT: &str = "This supplement already exists for the selected time.";

pub fn validate_new_supplement(new: &NewSupplement, existing: &[Supplement]) -> Result<()> {
    if new.name.trim().is_empty() {
        bail!("Supplement name must not be empty");
    }
    if existing
        .iter()
        .any(|s| s.name == new.name && s.period == new.period)
    {
        bail!(DUPLICATE_SUPPLEMENT);
    }
    Ok(())
}

/// `{id, name}` pair captured in a daily record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: String,
    pub name: String,
}

impl From<&Supplement> for SnapshotEntry {
    fn from(s: &Supplement) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
        }
    }
}

pub type TakenMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyIntakeRecord {
    #[serde(default)]
    pub taken: TakenMap,
    #[serde(default)]
    pub supplements: Vec<SnapshotEntry>,
}

impl DailyIntakeRecord {
    #[must_use]
    pub fn from_catalog(catalog: &[Supplement]) -> Self {
        Self {
            taken: TakenMap::new(),
            supplements: catalog.iter().map(SnapshotEntry::from).collect(),
        }
    }

    #[must_use]
    pub fn is_taken(&self, id: &str) -> bool {
        self.taken.get(id).copied().unwrap_or(false)
    }
}

/// The whole ledger blob, keyed by `YYYY-MM-DD`.
pub type IntakeStore = BTreeMap<String, DailyIntakeRecord>;

/// Hour and minute of a daily reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            bail!("Invalid time {hour:02}:{minute:02}. Hour must be 0-23 and minute 0-59");
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((h, m)) = s.trim().split_once(':') else {
            bail!("Invalid time '{s}'. Use HH:MM (e.g. 08:30)");
        };
        let hour: u32 = h
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid hour in '{s}'"))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid minute in '{s}'"))?;
        Self::new(hour, minute)
    }
}

/// Persisted alarm state for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmConfig {
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notification_ids: Vec<String>,
}

/// Result of a successful `set_alarm`.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmOutcome {
    pub period: Period,
    pub time: TimeOfDay,
    pub installed: usize,
    pub recurring: bool,
}

/// Supplements of one period grouped for display, with their taken flags.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodView {
    pub period: Period,
    pub all_taken: bool,
    pub items: Vec<IntakeItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeItem {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub relation: Relation,
    pub taken: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayView {
    pub date: String,
    pub periods: Vec<PeriodView>,
}

/// A well-known supplement offered while typing a name.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommonSupplement {
    pub name: &'static str,
    pub dosage: &'static str,
}

const fn common(name: &'static str, dosage: &'static str) -> CommonSupplement {
    CommonSupplement { name, dosage }
}

pub const COMMON_SUPPLEMENTS: &[CommonSupplement] = &[
    common("Vitamin D3", "2000 IU"),
    common("Vitamin C", "500 mg"),
    common("Vitamin B12", "1000 mcg"),
    common("Vitamin K2", "100 mcg"),
    common("Vitamin B Complex", "1 capsule"),
    common("Magnesium Glycinate", "400 mg"),
    common("Magnesium Citrate", "200 mg"),
    common("Omega-3 Fish Oil", "1000 mg"),
    common("Zinc", "15 mg"),
    common("Iron", "18 mg"),
    common("Calcium", "500 mg"),
    common("Probiotic", "1 capsule"),
    common("Multivitamin", "1 tablet"),
    common("Creatine Monohydrate", "5 g"),
    common("Ashwagandha", "600 mg"),
    common("Melatonin", "3 mg"),
    common("Folic Acid", "400 mcg"),
    common("Coenzyme Q10", "100 mg"),
];

/// Up to five common supplements whose name contains `input`, case-insensitively.
/// Blank input matches nothing; otherwise the input is matched as typed,
/// surrounding spaces included.
#[must_use]
pub fn filter_suggestions<'a>(
    input: &str,
    source: &'a [CommonSupplement],
) -> Vec<&'a CommonSupplement> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    let needle = input.to_lowercase();
    source
        .iter()
        .filter(|cs| cs.name.to_lowercase().contains(&needle))
        .take(5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplement(id: &str, name: &str, period: Period) -> Supplement {
        Supplement {
            id: id.to_string(),
            name: name.to_string(),
            dosage: "1 capsule".to_string(),
            reasoning: None,
            relation: Relation::With,
            period,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("Morning".parse::<Period>().unwrap(), Period::Morning);
        assert_eq!(" noon ".parse::<Period>().unwrap(), Period::Noon);
        assert_eq!("EVENING".parse::<Period>().unwrap(), Period::Evening);
        assert!("midnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_phrases_are_disjoint() {
        for a in PERIODS {
            for b in PERIODS {
                if a != b {
                    assert!(!a.phrase().contains(b.phrase()));
                }
            }
        }
    }

    #[test]
    fn test_relation_parse_and_serde() {
        assert_eq!("before".parse::<Relation>().unwrap(), Relation::Before);
        assert_eq!("With Food".parse::<Relation>().unwrap(), Relation::With);
        assert_eq!("after eating".parse::<Relation>().unwrap(), Relation::After);
        assert!("during".parse::<Relation>().is_err());

        let json = serde_json::to_string(&Relation::After).unwrap();
        assert_eq!(json, "\"After Eating\"");
    }

    #[test]
    fn test_time_of_day_parse() {
        let t: TimeOfDay = "08:05".parse().unwrap();
        assert_eq!(t, TimeOfDay { hour: 8, minute: 5 });
        assert_eq!(t.to_string(), "08:05");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("0800".parse::<TimeOfDay>().is_err());
        assert!("aa:bb".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_duplicate_name_and_period_rejected() {
        let existing = vec![supplement("a", "D3", Period::Morning)];
        let dup = NewSupplement {
            name: "D3".to_string(),
            dosage: String::new(),
            reasoning: None,
            relation: Relation::Before,
            period: Period::Morning,
        };
        let err = validate_new_supplement(&dup, &existing).unwrap_err();
        assert_eq!(err.to_string(), DUPLICATE_SUPPLEMENT);

        // Same name in another period is fine
        let other_period = NewSupplement {
            period: Period::Evening,
            ..dup
        };
        assert!(validate_new_supplement(&other_period, &existing).is_ok());
    }

    #[test]
    fn test_record_serializes_to_ledger_shape() {
        let mut record =
            DailyIntakeRecord::from_catalog(&[supplement("a", "D3", Period::Morning)]);
        record.taken.insert("a".to_string(), true);
        let mut store = IntakeStore::new();
        store.insert("2024-01-01".to_string(), record);

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "2024-01-01": {
                    "taken": { "a": true },
                    "supplements": [{ "id": "a", "name": "D3" }]
                }
            })
        );
    }

    #[test]
    fn test_record_missing_fields_default() {
        let store: IntakeStore =
            serde_json::from_str(r#"{"2024-01-01": {"taken": {"x": false}}}"#).unwrap();
        let record = &store["2024-01-01"];
        assert!(record.supplements.is_empty());
        assert!(!record.is_taken("x"));
        assert!(!record.is_taken("missing"));
    }

    #[test]
    fn test_filter_suggestions() {
        assert!(filter_suggestions("   ", COMMON_SUPPLEMENTS).is_empty());

        let vit = filter_suggestions("vitamin", COMMON_SUPPLEMENTS);
        assert_eq!(vit.len(), 5);
        assert!(vit.iter().all(|s| s.name.to_lowercase().contains("vitamin")));

        let mag = filter_suggestions("MAGNES", COMMON_SUPPLEMENTS);
        assert_eq!(mag.len(), 2);
        assert_eq!(mag[0].name, "Magnesium Glycinate");
    }

    #[test]
    fn test_filter_suggestions_matches_untrimmed_input() {
        assert_eq!(filter_suggestions("vit", COMMON_SUPPLEMENTS).len(), 5);
        // No name has a word starting with "vit"
        assert!(filter_suggestions(" vit", COMMON_SUPPLEMENTS).is_empty());

        let c: Vec<&str> = filter_suggestions(" c", COMMON_SUPPLEMENTS)
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(c, vec!["Vitamin C", "Vitamin B Complex", "Magnesium Citrate"]);
    }
}
