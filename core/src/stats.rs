//! Aggregate result types.
//!
//! RULE: every aggregate has a complete zero value (`Default`). Callers that
//! hit a datastore error get that zero value, never a partial object.

use crate::holder::InsuranceHolder;
use serde::{Deserialize, Serialize};

// ── Age brackets ──────────────────────────────────────────────────

/// Age brackets, inclusive on both ends: <25, 25–34, 35–44, 45–54, ≥55.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    Under25,
    From25To34,
    From35To44,
    From45To54,
    From55,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        Self::Under25,
        Self::From25To34,
        Self::From35To44,
        Self::From45To54,
        Self::From55,
    ];

    /// Inclusive `(min, max)`; `None` is unbounded.
    pub fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::Under25 => (None, Some(24)),
            Self::From25To34 => (Some(25), Some(34)),
            Self::From35To44 => (Some(35), Some(44)),
            Self::From45To54 => (Some(45), Some(54)),
            Self::From55 => (Some(55), None),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under25 => "Menos de 25",
            Self::From25To34 => "25-34 años",
            Self::From35To44 => "35-44 años",
            Self::From45To54 => "45-54 años",
            Self::From55 => "55 o más",
        }
    }

    pub fn contains(&self, age: i64) -> bool {
        let (min, max) = self.bounds();
        min.map_or(true, |m| age >= m) && max.map_or(true, |m| age <= m)
    }

    pub fn for_age(age: i64) -> AgeBracket {
        Self::ALL
            .into_iter()
            .find(|b| b.contains(age))
            .unwrap_or(Self::From55)
    }

    /// SQL CASE expression over `age`, generated from `bounds()` so the
    /// database and `for_age` can never disagree.
    pub fn sql_case() -> String {
        let arms = Self::ALL
            .iter()
            .map(|b| {
                let cond = match b.bounds() {
                    (None, Some(max)) => format!("age <= {max}"),
                    (Some(min), Some(max)) => format!("age BETWEEN {min} AND {max}"),
                    (Some(min), None) => format!("age >= {min}"),
                    (None, None) => "1 = 1".to_string(),
                };
                format!("WHEN {cond} THEN '{}'", b.label())
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!("CASE {arms} END")
    }
}

// ── Full summary ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralMetrics {
    pub total_holders: i64,
    pub active_policies: i64,
    pub inactive_policies: i64,
    pub expired_policies: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub total_insured_value: f64,
    pub total_used_coverage: f64,
    pub average_policy_value: f64,
    pub coverage_usage_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub average_age: i64,
    pub female_holders: i64,
    pub male_holders: i64,
}

/// One row of a group-by distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distributions {
    pub by_company: Vec<Bucket>,
    pub by_policy_type: Vec<Bucket>,
    pub by_city: Vec<Bucket>,
    /// Always all five brackets, in bracket order, zero-filled.
    pub by_age_group: Vec<Bucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionableInsights {
    pub expiring_in_30_days: i64,
    #[serde(rename = "expiringIn31_90Days")]
    pub expiring_in_31_90_days: i64,
    pub new_policies_last_30_days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderStats {
    pub general_metrics: GeneralMetrics,
    pub financial_metrics: FinancialMetrics,
    pub demographics: Demographics,
    pub distributions: Distributions,
    pub actionable_insights: ActionableInsights,
}

/// `100 * used / insured`, or 0 when nothing is insured.
pub fn coverage_usage_percentage(total_used: f64, total_insured: f64) -> f64 {
    if total_insured > 0.0 && total_used.is_finite() {
        100.0 * total_used / total_insured
    } else {
        0.0
    }
}

/// Zero-fill the age distribution so every bracket is present, in order.
pub fn complete_age_buckets(found: &[Bucket]) -> Vec<Bucket> {
    AgeBracket::ALL
        .iter()
        .map(|b| Bucket {
            name: b.label().to_string(),
            count: found
                .iter()
                .find(|f| f.name == b.label())
                .map_or(0, |f| f.count),
        })
        .collect()
}

// ── Page stats ────────────────────────────────────────────────────

/// Stats returned alongside a list page, scoped to the page's filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStats {
    pub active_policies: i64,
    pub total_patients: i64,
    /// No backing table.
    pub total_cases: Option<i64>,
}

// ── Dashboard overview ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub holders: i64,
    pub active_policies: i64,
    #[serde(rename = "created7d")]
    pub created_7d: i64,
    #[serde(rename = "updated7d")]
    pub updated_7d: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageTotals {
    pub total_max: f64,
    pub total_used: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringPolicy {
    pub id: String,
    pub name: String,
    pub ci: String,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    pub policy_end_date: Option<String>,
    pub days_left: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldersOverview {
    pub totals: OverviewTotals,
    pub coverage: CoverageTotals,
    pub status_distribution: Vec<StatusCount>,
    pub top_companies: Vec<Bucket>,
    pub expiring_soon: Vec<ExpiringPolicy>,
    pub recent: Vec<InsuranceHolder>,
}

/// Label for a holder row with no status.
pub const MISSING_LABEL: &str = "—";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_age_falls_in_exactly_one_bracket() {
        for age in 0..=150 {
            let hits = AgeBracket::ALL.iter().filter(|b| b.contains(age)).count();
            assert_eq!(hits, 1, "age {age} matched {hits} brackets");
            assert!(AgeBracket::for_age(age).contains(age));
        }
    }

    #[test]
    fn bracket_edges_are_inclusive() {
        assert_eq!(AgeBracket::for_age(24), AgeBracket::Under25);
        assert_eq!(AgeBracket::for_age(25), AgeBracket::From25To34);
        assert_eq!(AgeBracket::for_age(34), AgeBracket::From25To34);
        assert_eq!(AgeBracket::for_age(35), AgeBracket::From35To44);
        assert_eq!(AgeBracket::for_age(54), AgeBracket::From45To54);
        assert_eq!(AgeBracket::for_age(55), AgeBracket::From55);
    }

    #[test]
    fn sql_case_mentions_every_label() {
        let case = AgeBracket::sql_case();
        for b in AgeBracket::ALL {
            assert!(case.contains(b.label()));
        }
        assert!(case.starts_with("CASE WHEN age <= 24"));
    }

    #[test]
    fn usage_percentage_guards_zero_insured() {
        assert_eq!(coverage_usage_percentage(0.0, 0.0), 0.0);
        assert_eq!(coverage_usage_percentage(500.0, 0.0), 0.0);
        assert_eq!(coverage_usage_percentage(250.0, 1000.0), 25.0);
    }

    #[test]
    fn default_stats_are_all_zero() {
        let stats = HolderStats::default();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["generalMetrics"]["totalHolders"], 0);
        assert_eq!(json["financialMetrics"]["coverageUsagePercentage"], 0.0);
        assert_eq!(json["actionableInsights"]["expiringIn31_90Days"], 0);
        assert_eq!(json["demographics"]["averageAge"], 0);
    }

    #[test]
    fn age_buckets_are_zero_filled_in_order() {
        let found = vec![Bucket { name: "55 o más".into(), count: 3 }];
        let all = complete_age_buckets(&found);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].count, 0);
        assert_eq!(all[4].count, 3);
    }
}
