use serde::{Deserialize, Serialize};

use crate::models::{PERIODS, Period, RELATIONS, Relation};

pub const CATEGORIZE_URL: &str = "https://vitacheck-api.onrender.com/api/categorize-supplement";

pub const AI_UNAVAILABLE: &str =
    "Unable to provide AI reasoning at the moment. Please try again later.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeRequest<'a> {
    pub supplement_name: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeResponse {
    pub suggested_meal_category: Option<String>,
    pub suggested_time_category: Option<String>,
    pub reasoning: Option<String>,
}

/// Meal relation and period proposed for a supplement name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySuggestion {
    pub relation: Relation,
    pub period: Period,
    pub reasoning: Option<String>,
}

fn match_relation(raw: Option<&str>) -> Relation {
    raw.and_then(|r| RELATIONS.iter().find(|rel| rel.label().eq_ignore_ascii_case(r.trim())))
        .copied()
        .unwrap_or(Relation::Before)
}

fn match_period(raw: Option<&str>) -> Period {
    raw.and_then(|p| PERIODS.iter().find(|per| per.label().eq_ignore_ascii_case(p.trim())))
        .copied()
        .unwrap_or(Period::Morning)
}

/// Categories the service does not recognize fall back to Before Eating and
/// Morning.
#[must_use]
pub fn suggestion_from_response(resp: CategorizeResponse) -> CategorySuggestion {
    CategorySuggestion {
        relation: match_relation(resp.suggested_meal_category.as_deref()),
        period: match_period(resp.suggested_time_category.as_deref()),
        reasoning: resp.reasoning.filter(|r| !r.trim().is_empty()),
    }
}
