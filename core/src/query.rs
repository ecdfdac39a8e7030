//! Query builder: filter set → parameterized WHERE / ORDER BY / LIMIT.
//!
//! RULE: request values only ever reach SQL as bound parameters.
//! Column names and sort clauses come from the fixed tables below.

use crate::{config::PaginationConfig, store::UNICODE_LOWER_FN};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Columns searched by the free-text term.
const SEARCH_COLUMNS: [&str; 5] = ["name", "ci", "phone", "email", "policyNumber"];

// ── Filters ───────────────────────────────────────────────────────

/// Optional filters. Absent (or blank) filters contribute no predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderFilter {
    pub q: Option<String>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub policy_type: Option<String>,
    pub city: Option<String>,
}

impl HolderFilter {
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_search(mut self, q: &str) -> Self {
        self.q = Some(q.to_string());
        self
    }

    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    /// Trim every value and drop the blank ones.
    pub fn normalized(&self) -> Self {
        let norm = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            q: norm(&self.q),
            status: norm(&self.status),
            company: norm(&self.company),
            policy_type: norm(&self.policy_type),
            city: norm(&self.city),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized() == Self::default()
    }

    /// Compose the conjunctive predicate for this filter set.
    pub fn to_where(&self) -> WhereClause {
        let f = self.normalized();
        let mut predicates = Vec::new();
        let mut params = Vec::new();

        if let Some(q) = &f.q {
            // Both sides are folded with the Unicode-aware lowercase function.
            let pattern = format!("%{}%", escape_like(&q.to_lowercase()));
            let ors = SEARCH_COLUMNS
                .iter()
                .map(|col| format!("{UNICODE_LOWER_FN}({col}) LIKE ? ESCAPE '\\'"))
                .collect::<Vec<_>>()
                .join(" OR ");
            predicates.push(format!("({ors})"));
            params.extend(SEARCH_COLUMNS.iter().map(|_| Value::Text(pattern.clone())));
        }
        for (column, value) in [
            ("policyStatus", &f.status),
            ("insuranceCompany", &f.company),
            ("policyType", &f.policy_type),
            ("city", &f.city),
        ] {
            if let Some(v) = value {
                predicates.push(format!("{column} = ?"));
                params.push(Value::Text(v.clone()));
            }
        }

        WhereClause { predicates, params }
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Conjunction of predicates plus their bound parameters, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    predicates: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    /// `WHERE a AND b`, or the empty string when there is nothing to filter.
    pub fn sql(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicates.join(" AND "))
        }
    }

    /// The same clause with a fixed extra predicate ANDed on.
    /// `extra` must be static SQL; its placeholders (if any) bind after `params()`.
    pub fn and(&self, extra: &str) -> String {
        if self.predicates.is_empty() {
            format!("WHERE {extra}")
        } else {
            format!("WHERE {} AND {extra}", self.predicates.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

// ── Sorting ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    NameAsc,
    NameDesc,
    StatusAsc,
    StatusDesc,
}

impl SortKey {
    /// Parse `<field>.<direction>`; anything off the allow-list is `name.asc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("name.desc") => Self::NameDesc,
            Some("policyStatus.asc") => Self::StatusAsc,
            Some("policyStatus.desc") => Self::StatusDesc,
            _ => Self::NameAsc,
        }
    }

    /// ORDER BY with a unique tie-break so pages never overlap.
    pub fn order_clause(&self) -> &'static str {
        match self {
            Self::NameAsc => "ORDER BY name ASC, id ASC",
            Self::NameDesc => "ORDER BY name DESC, id ASC",
            Self::StatusAsc => "ORDER BY policyStatus ASC, name ASC, id ASC",
            Self::StatusDesc => "ORDER BY policyStatus DESC, name ASC, id ASC",
        }
    }
}

// ── Pagination ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    /// Page is 1-based and floored at 1 (no upper bound); per-page is clamped.
    pub fn clamped(page: Option<i64>, per_page: Option<i64>, cfg: &PaginationConfig) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(cfg.default_per_page)
                .clamp(cfg.min_per_page, cfg.max_per_page),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        total_pages(total, self.per_page)
    }
}

/// `max(1, ceil(total / per_page))`.
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        return 1;
    }
    ((total + per_page - 1) / per_page).max(1)
}

// ── Assembled query ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: HolderFilter,
    pub sort: SortKey,
    pub pagination: Option<Pagination>,
}

impl ListQuery {
    pub fn new(filter: HolderFilter, sort: SortKey, pagination: Pagination) -> Self {
        Self {
            filter,
            sort,
            pagination: Some(pagination),
        }
    }

    pub fn pagination(&self, cfg: &PaginationConfig) -> Pagination {
        self.pagination
            .unwrap_or_else(|| Pagination::clamped(None, None, cfg))
    }

    pub fn plan(&self, cfg: &PaginationConfig) -> QueryPlan {
        let pagination = self.pagination(cfg);
        QueryPlan {
            where_clause: self.filter.to_where(),
            order_clause: self.sort.order_clause(),
            limit: pagination.per_page,
            offset: pagination.offset(),
        }
    }
}

/// Everything the store needs to run the count and page queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub where_clause: WhereClause,
    pub order_clause: &'static str,
    pub limit: i64,
    pub offset: i64,
}

/// Raw list parameters as they arrive on a query string.
/// Parsing is lenient: unparsable numbers fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub policy_type: Option<String>,
    pub city: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl ListParams {
    pub fn filter(&self) -> HolderFilter {
        HolderFilter {
            q: self.q.clone(),
            status: self.status.clone(),
            company: self.company.clone(),
            policy_type: self.policy_type.clone(),
            city: self.city.clone(),
        }
        .normalized()
    }

    pub fn into_query(self, cfg: &PaginationConfig) -> ListQuery {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        ListQuery {
            filter: self.filter(),
            sort: SortKey::parse(self.sort.as_deref()),
            pagination: Some(Pagination::clamped(
                parse(&self.page),
                parse(&self.per_page),
                cfg,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PaginationConfig {
        PaginationConfig::default()
    }

    #[test]
    fn empty_filter_has_no_where() {
        let w = HolderFilter::default().to_where();
        assert_eq!(w.sql(), "");
        assert!(w.params().is_empty());
        assert_eq!(w.and("policyStatus = 'Activo'"), "WHERE policyStatus = 'Activo'");
    }

    #[test]
    fn blank_search_is_absent() {
        let w = HolderFilter::default().with_search("   ").to_where();
        assert!(w.is_empty());
    }

    #[test]
    fn search_binds_one_pattern_per_column() {
        let w = HolderFilter::default().with_search(" ÁNA ").to_where();
        assert_eq!(w.params().len(), SEARCH_COLUMNS.len());
        assert!(w
            .params()
            .iter()
            .all(|p| *p == Value::Text("%ána%".to_string())));
        assert!(w.sql().starts_with("WHERE (unicode_lower(name) LIKE ?"));
    }

    #[test]
    fn filters_are_conjunctive_and_ordered() {
        let f = HolderFilter {
            q: Some("x".into()),
            status: Some("Activo".into()),
            company: Some("Mapfre".into()),
            policy_type: Some("Salud".into()),
            city: Some("Valencia".into()),
        };
        let w = f.to_where();
        assert_eq!(w.sql().matches(" AND ").count(), 4);
        let tail: Vec<_> = w.params()[SEARCH_COLUMNS.len()..].to_vec();
        assert_eq!(
            tail,
            vec![
                Value::Text("Activo".into()),
                Value::Text("Mapfre".into()),
                Value::Text("Salud".into()),
                Value::Text("Valencia".into()),
            ]
        );
    }

    #[test]
    fn user_text_never_reaches_sql() {
        let hostile = "'; DROP TABLE insurance_holders; --";
        let f = HolderFilter {
            q: Some(hostile.into()),
            status: Some(hostile.into()),
            company: Some(hostile.into()),
            policy_type: Some(hostile.into()),
            city: Some(hostile.into()),
        };
        let sql = f.to_where().sql();
        assert!(!sql.contains("DROP"));
        let sort = SortKey::parse(Some("name; DROP TABLE x"));
        assert_eq!(sort, SortKey::NameAsc);
        assert!(!sort.order_clause().contains("DROP"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn sort_allow_list_falls_back_to_name_asc() {
        assert_eq!(SortKey::parse(None), SortKey::NameAsc);
        assert_eq!(SortKey::parse(Some("name.desc")), SortKey::NameDesc);
        assert_eq!(SortKey::parse(Some("policyStatus.asc")), SortKey::StatusAsc);
        assert_eq!(SortKey::parse(Some("policyStatus.desc")), SortKey::StatusDesc);
        assert_eq!(SortKey::parse(Some("ci.asc")), SortKey::NameAsc);
        assert_eq!(SortKey::parse(Some("NAME.DESC")), SortKey::NameAsc);
    }

    #[test]
    fn per_page_always_lands_in_bounds() {
        for raw in -100..=200 {
            let p = Pagination::clamped(Some(1), Some(raw), &cfg());
            assert!((5..=50).contains(&p.per_page), "per_page {raw} -> {}", p.per_page);
        }
        assert_eq!(Pagination::clamped(None, None, &cfg()).per_page, 10);
    }

    #[test]
    fn page_floors_at_one_without_upper_bound() {
        assert_eq!(Pagination::clamped(Some(0), None, &cfg()).page, 1);
        assert_eq!(Pagination::clamped(Some(-7), None, &cfg()).page, 1);
        let far = Pagination::clamped(Some(10_000), Some(10), &cfg());
        assert_eq!(far.page, 10_000);
        assert_eq!(far.offset(), 99_990);
    }

    #[test]
    fn total_pages_is_at_least_one() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(12, 5), 3);
        for total in 0..500 {
            for per_page in 5..=50 {
                let pages = total_pages(total, per_page);
                let expected = ((total as f64) / (per_page as f64)).ceil().max(1.0) as i64;
                assert_eq!(pages, expected);
            }
        }
    }

    #[test]
    fn params_parse_leniently() {
        let params = ListParams {
            q: Some("  ".into()),
            status: Some("Activo".into()),
            sort: Some("bogus".into()),
            page: Some("abc".into()),
            per_page: Some("500".into()),
            ..ListParams::default()
        };
        let q = params.into_query(&cfg());
        assert_eq!(q.filter.q, None);
        assert_eq!(q.filter.status.as_deref(), Some("Activo"));
        assert_eq!(q.sort, SortKey::NameAsc);
        assert_eq!(q.pagination, Some(Pagination { page: 1, per_page: 50 }));
    }

    #[test]
    fn plan_reports_limit_and_offset() {
        let q = ListQuery::new(
            HolderFilter::default().with_status("Activo"),
            SortKey::StatusDesc,
            Pagination::clamped(Some(2), Some(5), &cfg()),
        );
        let plan = q.plan(&cfg());
        assert_eq!(plan.limit, 5);
        assert_eq!(plan.offset, 5);
        assert_eq!(plan.where_clause.sql(), "WHERE policyStatus = ?");
        assert!(plan.order_clause.starts_with("ORDER BY policyStatus DESC"));
    }
}
