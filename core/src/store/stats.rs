use super::{holder_from_row, HolderStore, HOLDER_COLUMNS};
use crate::{
    error::HolderResult,
    holder::InsuranceHolder,
    query::WhereClause,
    stats::{
        coverage_usage_percentage, ActionableInsights, AgeBracket, Bucket, CoverageTotals,
        Demographics, ExpiringPolicy, FinancialMetrics, GeneralMetrics, OverviewTotals,
        StatusCount, MISSING_LABEL,
    },
    types::{PolicyStatus, GENDER_FEMALE, GENDER_MALE},
};
use rusqlite::{params_from_iter, types::Value};

/// Group-by targets for distributions. Column names are fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionColumn {
    Company,
    PolicyType,
    City,
}

impl DistributionColumn {
    fn column(&self) -> &'static str {
        match self {
            Self::Company => "insuranceCompany",
            Self::PolicyType => "policyType",
            Self::City => "city",
        }
    }
}

/// Inclusive date windows for the actionable-insight counters,
/// as `YYYY-MM-DD` strings computed by the caller from its clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightWindows {
    pub today: String,
    pub expiring_until: String,
    pub late_from: String,
    pub late_until: String,
    pub new_since: String,
}

/// Everything the single-pass metrics query produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRow {
    pub general: GeneralMetrics,
    pub financial: FinancialMetrics,
    pub demographics: Demographics,
    pub insights: ActionableInsights,
}

fn bind(filter: &WhereClause, extra: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut bound = filter.params().to_vec();
    bound.extend(extra);
    bound
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

impl HolderStore {
    // ── Summary metrics ───────────────────────────────────────────

    /// Counts, financial sums, demographics and insight windows in one scan.
    pub fn compute_metrics(
        &self,
        filter: &WhereClause,
        windows: &InsightWindows,
    ) -> HolderResult<MetricsRow> {
        let sql = format!(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN policyStatus = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN policyStatus = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN policyStatus = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(maxCoverageAmount), 0.0),
                COALESCE(SUM(usedCoverageAmount), 0.0),
                COALESCE(AVG(maxCoverageAmount), 0.0),
                AVG(age),
                COALESCE(SUM(CASE WHEN gender = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN gender = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN policyEndDate BETWEEN ? AND ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN policyEndDate BETWEEN ? AND ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN policyStartDate BETWEEN ? AND ? THEN 1 ELSE 0 END), 0)
             FROM insurance_holders {}",
            filter.sql()
        );
        // Select-list placeholders precede the WHERE placeholders.
        let mut bound = vec![
            text(PolicyStatus::Activo.as_str()),
            text(PolicyStatus::Inactivo.as_str()),
            text(PolicyStatus::Vencido.as_str()),
            text(GENDER_FEMALE),
            text(GENDER_MALE),
            text(&windows.today),
            text(&windows.expiring_until),
            text(&windows.late_from),
            text(&windows.late_until),
            text(&windows.new_since),
            text(&windows.today),
        ];
        bound.extend(filter.params().iter().cloned());

        let row = self.conn.query_row(&sql, params_from_iter(bound.iter()), |row| {
            let insured: f64 = row.get(4)?;
            let used: f64 = row.get(5)?;
            let avg_age: Option<f64> = row.get(7)?;
            Ok(MetricsRow {
                general: GeneralMetrics {
                    total_holders: row.get(0)?,
                    active_policies: row.get(1)?,
                    inactive_policies: row.get(2)?,
                    expired_policies: row.get(3)?,
                },
                financial: FinancialMetrics {
                    total_insured_value: insured,
                    total_used_coverage: used,
                    average_policy_value: row.get(6)?,
                    coverage_usage_percentage: coverage_usage_percentage(used, insured),
                },
                demographics: Demographics {
                    average_age: avg_age.map_or(0, |a| a.round() as i64),
                    female_holders: row.get(8)?,
                    male_holders: row.get(9)?,
                },
                insights: ActionableInsights {
                    expiring_in_30_days: row.get(10)?,
                    expiring_in_31_90_days: row.get(11)?,
                    new_policies_last_30_days: row.get(12)?,
                },
            })
        })?;
        Ok(row)
    }

    /// Top-`limit` non-empty values of `column`, most frequent first.
    pub fn distribution(
        &self,
        column: DistributionColumn,
        filter: &WhereClause,
        limit: i64,
    ) -> HolderResult<Vec<Bucket>> {
        let col = column.column();
        let sql = format!(
            "SELECT {col}, COUNT(*) AS n FROM insurance_holders {}
             GROUP BY {col} ORDER BY n DESC, {col} ASC LIMIT ?",
            filter.and(&format!("{col} IS NOT NULL AND {col} <> ''")),
        );
        let bound = bind(filter, [Value::Integer(limit)]);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            Ok(Bucket {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Counts per age bracket. Brackets with no holders are absent;
    /// holders without an age are not counted.
    pub fn age_distribution(&self, filter: &WhereClause) -> HolderResult<Vec<Bucket>> {
        let sql = format!(
            "SELECT {} AS bracket, COUNT(*) FROM insurance_holders {} GROUP BY bracket",
            AgeBracket::sql_case(),
            filter.and("age IS NOT NULL"),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params()), |row| {
            Ok(Bucket {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Page stats ────────────────────────────────────────────────

    pub fn count_active(&self, filter: &WhereClause) -> HolderResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM insurance_holders {}",
            filter.and("policyStatus = ?"),
        );
        let bound = bind(filter, [text(PolicyStatus::Activo.as_str())]);
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bound.iter()), |row| row.get(0))?;
        Ok(n)
    }

    /// Distinct patients linked to any holder matching `filter`.
    pub fn count_linked_patients(&self, filter: &WhereClause) -> HolderResult<i64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT r.patientId) FROM holder_patient_relationships r
             WHERE r.holderId IN (SELECT id FROM insurance_holders {})",
            filter.sql(),
        );
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
        Ok(n)
    }

    // ── Dashboard overview ────────────────────────────────────────

    /// Totals plus created/updated counts since `since` (inclusive).
    pub fn overview_totals(&self, filter: &WhereClause, since: &str) -> HolderResult<OverviewTotals> {
        let sql = format!(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN policyStatus = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN updated_at >= ? THEN 1 ELSE 0 END), 0)
             FROM insurance_holders {}",
            filter.sql(),
        );
        let mut bound = vec![text(PolicyStatus::Activo.as_str()), text(since), text(since)];
        bound.extend(filter.params().iter().cloned());
        let totals = self.conn.query_row(&sql, params_from_iter(bound.iter()), |row| {
            Ok(OverviewTotals {
                holders: row.get(0)?,
                active_policies: row.get(1)?,
                created_7d: row.get(2)?,
                updated_7d: row.get(3)?,
            })
        })?;
        Ok(totals)
    }

    pub fn coverage_totals(&self, filter: &WhereClause) -> HolderResult<CoverageTotals> {
        let sql = format!(
            "SELECT COALESCE(SUM(maxCoverageAmount), 0.0), COALESCE(SUM(usedCoverageAmount), 0.0)
             FROM insurance_holders {}",
            filter.sql(),
        );
        let totals = self
            .conn
            .query_row(&sql, params_from_iter(filter.params()), |row| {
                Ok(CoverageTotals {
                    total_max: row.get(0)?,
                    total_used: row.get(1)?,
                })
            })?;
        Ok(totals)
    }

    pub fn status_distribution(&self, filter: &WhereClause) -> HolderResult<Vec<StatusCount>> {
        let sql = format!(
            "SELECT COALESCE(NULLIF(policyStatus, ''), ?) AS status, COUNT(*) AS n
             FROM insurance_holders {} GROUP BY status ORDER BY n DESC, status ASC",
            filter.sql(),
        );
        let mut bound = vec![text(MISSING_LABEL)];
        bound.extend(filter.params().iter().cloned());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Policies ending within `[today, until]`, soonest first.
    pub fn expiring_policies(
        &self,
        filter: &WhereClause,
        today: &str,
        until: &str,
        limit: i64,
    ) -> HolderResult<Vec<ExpiringPolicy>> {
        let sql = format!(
            "SELECT id, name, ci, insuranceCompany, policyNumber, policyEndDate,
                    CAST(julianday(policyEndDate) - julianday(?) AS INTEGER) AS daysLeft
             FROM insurance_holders {}
             ORDER BY policyEndDate ASC, name ASC, id ASC
             LIMIT ?",
            filter.and("policyEndDate IS NOT NULL AND policyEndDate BETWEEN ? AND ?"),
        );
        let mut bound = vec![text(today)];
        bound.extend(filter.params().iter().cloned());
        bound.extend([text(today), text(until), Value::Integer(limit)]);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            Ok(ExpiringPolicy {
                id: row.get(0)?,
                name: row.get(1)?,
                ci: row.get(2)?,
                insurance_company: row.get(3)?,
                policy_number: row.get(4)?,
                policy_end_date: row.get(5)?,
                days_left: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Most recently touched holders.
    pub fn recent_holders(&self, filter: &WhereClause, limit: i64) -> HolderResult<Vec<InsuranceHolder>> {
        let sql = format!(
            "SELECT {HOLDER_COLUMNS} FROM insurance_holders {}
             ORDER BY updated_at DESC, created_at DESC, id ASC LIMIT ?",
            filter.sql(),
        );
        let bound = bind(filter, [Value::Integer(limit)]);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), holder_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
