//! Holder service: the façade the HTTP layer and page code call.
//!
//! RULE: the service never executes SQL. It validates, picks the clock's
//! date windows, fans independent reads out over pooled connections and
//! delegates every statement to the store.

use crate::{
    auth::{self, Session},
    clock::Clock,
    config::AppConfig,
    demo,
    error::{HolderError, HolderResult},
    holder::{HolderField, HolderPatch, InsuranceHolder, NewHolder},
    pool::StorePool,
    query::{HolderFilter, ListQuery, WhereClause},
    stats::{
        complete_age_buckets, Distributions, HolderStats, HoldersOverview, ListStats,
    },
    store::{DistributionColumn, InsightWindows},
    types::{DATE_FORMAT, TIMESTAMP_FORMAT},
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, thread};

/// One page of holders plus the page-scoped stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderList {
    pub items: Vec<InsuranceHolder>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub stats: ListStats,
}

#[derive(Clone)]
pub struct HolderService {
    pool: StorePool,
    clock: Arc<dyn Clock>,
    config: AppConfig,
}

fn joined<T>(handle: thread::ScopedJoinHandle<'_, HolderResult<T>>) -> HolderResult<T> {
    handle
        .join()
        .map_err(|_| HolderError::Pool("query worker panicked".into()))?
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn day(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl HolderService {
    pub fn new(pool: StorePool, clock: Arc<dyn Clock>, config: AppConfig) -> Self {
        Self { pool, clock, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    fn now_stamp(&self) -> String {
        self.clock.now().format(TIMESTAMP_FORMAT).to_string()
    }

    // ── Reads ─────────────────────────────────────────────────────

    /// Count, page and page stats run concurrently, each on its own connection.
    pub fn list(&self, query: &ListQuery) -> HolderResult<HolderList> {
        let pagination = query.pagination(&self.config.pagination);
        let plan = query.plan(&self.config.pagination);

        let (total, items, stats) = thread::scope(|s| {
            let count = s.spawn(|| self.pool.acquire()?.count_holders(&plan.where_clause));
            let page = s.spawn(|| self.pool.acquire()?.holders_page(&plan));
            let stats = self.list_stats(&plan.where_clause);
            (joined(count), joined(page), stats)
        });
        let total = total?;

        Ok(HolderList {
            items: items?,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
            stats,
        })
    }

    /// Active policies and linked patients for the filter. Degrades to zeros.
    fn list_stats(&self, filter: &WhereClause) -> ListStats {
        let computed = (|| -> HolderResult<ListStats> {
            let store = self.pool.acquire()?;
            Ok(ListStats {
                active_policies: store.count_active(filter)?,
                total_patients: store.count_linked_patients(filter)?,
                total_cases: None,
            })
        })();
        computed.unwrap_or_else(|e| {
            log::warn!("list stats unavailable: {e}");
            ListStats::default()
        })
    }

    /// Full aggregate over the holders matching `filter`.
    /// A datastore failure yields the all-zero aggregate, never an error.
    pub fn summary(&self, filter: &HolderFilter) -> HolderStats {
        self.try_summary(filter).unwrap_or_else(|e| {
            log::error!("summary failed, returning empty aggregate: {e}");
            HolderStats::default()
        })
    }

    pub fn try_summary(&self, filter: &HolderFilter) -> HolderResult<HolderStats> {
        let filter = filter.to_where();
        let windows = self.insight_windows();
        let top_n = self.config.stats.top_n;

        thread::scope(|s| {
            let metrics = s.spawn(|| self.pool.acquire()?.compute_metrics(&filter, &windows));
            let companies = s.spawn(|| {
                self.pool
                    .acquire()?
                    .distribution(DistributionColumn::Company, &filter, top_n)
            });
            let types = s.spawn(|| {
                self.pool
                    .acquire()?
                    .distribution(DistributionColumn::PolicyType, &filter, top_n)
            });
            let cities = s.spawn(|| {
                self.pool
                    .acquire()?
                    .distribution(DistributionColumn::City, &filter, top_n)
            });
            let ages = s.spawn(|| self.pool.acquire()?.age_distribution(&filter));

            let metrics = joined(metrics)?;
            Ok(HolderStats {
                general_metrics: metrics.general,
                financial_metrics: metrics.financial,
                demographics: metrics.demographics,
                distributions: Distributions {
                    by_company: joined(companies)?,
                    by_policy_type: joined(types)?,
                    by_city: joined(cities)?,
                    by_age_group: complete_age_buckets(&joined(ages)?),
                },
                actionable_insights: metrics.insights,
            })
        })
    }

    fn insight_windows(&self) -> InsightWindows {
        let today = self.clock.today();
        let cfg = &self.config.stats;
        InsightWindows {
            today: day(today),
            expiring_until: day(today + Duration::days(cfg.expiring_window_days)),
            late_from: day(today + Duration::days(cfg.expiring_window_days + 1)),
            late_until: day(today + Duration::days(cfg.expiring_late_window_days)),
            new_since: day(today - Duration::days(cfg.new_policy_window_days)),
        }
    }

    /// Dashboard overview over the whole table. Degrades to an empty overview.
    pub fn overview(&self) -> HoldersOverview {
        self.try_overview().unwrap_or_else(|e| {
            log::error!("overview failed, returning empty overview: {e}");
            HoldersOverview::default()
        })
    }

    pub fn try_overview(&self) -> HolderResult<HoldersOverview> {
        let all = WhereClause::default();
        let cfg = self.config.stats;
        let today = self.clock.today();
        let since = day(today - Duration::days(cfg.recent_activity_days));
        let (from, until) = (day(today), day(today + Duration::days(cfg.expiring_window_days)));

        thread::scope(|s| {
            let totals = s.spawn(|| self.pool.acquire()?.overview_totals(&all, &since));
            let coverage = s.spawn(|| self.pool.acquire()?.coverage_totals(&all));
            let statuses = s.spawn(|| self.pool.acquire()?.status_distribution(&all));
            let companies = s.spawn(|| {
                self.pool
                    .acquire()?
                    .distribution(DistributionColumn::Company, &all, cfg.top_companies)
            });
            let expiring = s.spawn(|| {
                self.pool
                    .acquire()?
                    .expiring_policies(&all, &from, &until, cfg.expiring_soon_limit)
            });
            let recent = s.spawn(|| self.pool.acquire()?.recent_holders(&all, cfg.recent_limit));

            Ok(HoldersOverview {
                totals: joined(totals)?,
                coverage: joined(coverage)?,
                status_distribution: joined(statuses)?,
                top_companies: joined(companies)?,
                expiring_soon: joined(expiring)?,
                recent: joined(recent)?,
            })
        })
    }

    pub fn get(&self, id: &str, include_patients: bool) -> HolderResult<InsuranceHolder> {
        let store = self.pool.acquire()?;
        let mut holder = store
            .get_holder(id)?
            .ok_or_else(|| HolderError::not_found("Insurance holder", id))?;
        if include_patients {
            holder.patients = Some(store.patients_for_holder(id)?);
        }
        Ok(holder)
    }

    /// Exact lookup by CI and/or policy number. At least one key is required.
    pub fn lookup(&self, ci: Option<&str>, policy_number: Option<&str>) -> HolderResult<Vec<InsuranceHolder>> {
        let (ci, policy_number) = (non_blank(ci), non_blank(policy_number));
        if ci.is_none() && policy_number.is_none() {
            return Err(HolderError::invalid("ci", "Provide a ci or a policyNumber"));
        }
        self.pool.acquire()?.lookup_holders(ci, policy_number)
    }

    pub fn companies(&self) -> HolderResult<Vec<String>> {
        self.pool.acquire()?.distinct_companies()
    }

    // ── Mutations ─────────────────────────────────────────────────

    pub fn create(&self, input: NewHolder) -> HolderResult<InsuranceHolder> {
        let holder = input.normalize(self.clock.today())?;
        let ci = holder.ci.clone().unwrap_or_default();
        let store = self.pool.acquire()?;
        if store.ci_exists(&ci)? {
            log::warn!("create rejected: duplicate ci {ci}");
            return Err(HolderError::duplicate_ci(&ci));
        }

        let id = uuid::Uuid::new_v4().to_string();
        store.insert_holder(&id, &holder, &self.now_stamp())?;
        log::info!("Created insurance holder {id} (ci {ci})");
        store
            .get_holder(&id)?
            .ok_or_else(|| HolderError::not_found("Insurance holder", id))
    }

    pub fn update(
        &self,
        id: &str,
        body: &serde_json::Map<String, serde_json::Value>,
    ) -> HolderResult<InsuranceHolder> {
        let patch = HolderPatch::from_json(body)?.with_derived_age(self.clock.today());
        let store = self.pool.acquire()?;
        if let Some(ci) = patch.text(HolderField::Ci) {
            let taken = store
                .lookup_holders(Some(ci), None)?
                .iter()
                .any(|other| other.id != id);
            if taken {
                return Err(HolderError::duplicate_ci(ci));
            }
        }

        store.update_holder(id, &patch, &self.now_stamp())?;
        log::info!(
            "Updated insurance holder {id}: {}",
            patch
                .changes()
                .iter()
                .map(|(f, _)| f.column())
                .collect::<Vec<_>>()
                .join(", ")
        );
        store
            .get_holder(id)?
            .ok_or_else(|| HolderError::not_found("Insurance holder", id))
    }

    pub fn delete(&self, id: &str) -> HolderResult<()> {
        if !self.pool.acquire()?.delete_holder(id)? {
            return Err(HolderError::not_found("Insurance holder", id));
        }
        log::info!("Deleted insurance holder {id}");
        Ok(())
    }

    // ── Sessions & seeding ────────────────────────────────────────

    pub fn resolve_session(&self, cookie: Option<&str>) -> HolderResult<Session> {
        let store = self.pool.acquire()?;
        auth::resolve_session(&store, cookie)
    }

    /// Insert `n` demo holders and the demo users. Existing CIs and users
    /// are skipped so reseeding is harmless.
    pub fn seed_demo(&self, seed: u64, n: usize) -> HolderResult<usize> {
        let store = self.pool.acquire()?;
        for user in demo::users() {
            if store.find_user(&user.id)?.is_none() {
                store.insert_user(&user)?;
            }
        }
        drop(store);

        let mut inserted = 0;
        for holder in demo::generate(seed, n, self.clock.today()) {
            match self.create(holder) {
                Ok(_) => inserted += 1,
                Err(HolderError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        log::info!("Seeded {inserted} demo holders (seed {seed})");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::FixedClock, query::ListQuery};

    fn service_with(n: usize) -> HolderService {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let svc = HolderService::new(
            StorePool::in_memory().unwrap(),
            Arc::new(FixedClock::on(today)),
            AppConfig::default_test(),
        );
        for i in 0..n {
            svc.create(NewHolder::new(&format!("V-{i}"), &format!("Titular {i}"), "0414"))
                .unwrap();
        }
        svc
    }

    fn break_schema(svc: &HolderService, sql: &str) {
        svc.pool().acquire().unwrap().execute_batch(sql).unwrap();
    }

    #[test]
    fn summary_and_overview_degrade_to_zero_on_database_error() {
        let svc = service_with(3);
        assert_eq!(svc.summary(&HolderFilter::default()).general_metrics.total_holders, 3);

        break_schema(&svc, "ALTER TABLE insurance_holders RENAME TO holders_gone;");
        assert!(svc.try_summary(&HolderFilter::default()).is_err());
        assert_eq!(svc.summary(&HolderFilter::default()), HolderStats::default());
        assert!(svc.try_overview().is_err());
        assert_eq!(svc.overview(), HoldersOverview::default());
        assert!(svc.list(&ListQuery::default()).is_err(), "the page itself is not degraded");
    }

    #[test]
    fn list_stats_degrade_without_failing_the_page() {
        let svc = service_with(3);
        assert_eq!(svc.list(&ListQuery::default()).unwrap().stats.active_policies, 3);

        // Page rows still count relationships; the stats query needs patientId.
        break_schema(
            &svc,
            "DROP TABLE holder_patient_relationships;
             CREATE TABLE holder_patient_relationships (holderId TEXT);",
        );
        let page = svc.list(&ListQuery::default()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.stats, ListStats::default());
    }
}
