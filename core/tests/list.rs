//! Paginated search through the service: filters, sort order, paging bounds.

use chrono::NaiveDate;
use holders_core::{
    clock::FixedClock,
    config::AppConfig,
    holder::NewHolder,
    pool::StorePool,
    query::{HolderFilter, ListParams, ListQuery, Pagination, SortKey},
    service::HolderService,
    types::PolicyStatus,
};
use std::{collections::HashSet, sync::Arc};

fn service() -> HolderService {
    let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    HolderService::new(
        StorePool::in_memory().unwrap(),
        Arc::new(FixedClock::on(today)),
        AppConfig::default_test(),
    )
}

fn holder(i: usize, status: PolicyStatus) -> NewHolder {
    NewHolder::new(&format!("V-{i}"), &format!("Titular {i:02}"), "0414-5550000").with_status(status)
}

/// 12 active + 3 inactive holders.
fn seeded() -> HolderService {
    let svc = service();
    for i in 1..=12 {
        svc.create(holder(i, PolicyStatus::Activo)).unwrap();
    }
    for i in 13..=15 {
        svc.create(holder(i, PolicyStatus::Inactivo)).unwrap();
    }
    svc
}

fn query(filter: HolderFilter, page: i64, per_page: i64) -> ListQuery {
    ListQuery::new(filter, SortKey::NameAsc, Pagination { page, per_page })
}

/// Status filter with page 2 of 5 returns the second slice of the 12 actives.
#[test]
fn status_filter_paginates_active_holders() {
    let svc = seeded();
    let filter = HolderFilter::default().with_status("Activo");

    let page2 = svc.list(&query(filter.clone(), 2, 5)).unwrap();
    assert_eq!(page2.total, 12);
    assert_eq!(page2.total_pages, 3);
    assert_eq!(page2.items.len(), 5);
    assert!(page2.items.iter().all(|h| h.policy_status == "Activo"));
    assert_eq!(page2.items[0].name, "Titular 06");

    let page3 = svc.list(&query(filter, 3, 5)).unwrap();
    assert_eq!(page3.items.len(), 2, "last page holds the remainder");
}

/// Walking every page yields each holder exactly once.
#[test]
fn pages_never_overlap() {
    let svc = seeded();
    let mut seen = HashSet::new();
    for page in 1..=3 {
        let result = svc.list(&query(HolderFilter::default(), page, 5)).unwrap();
        for h in result.items {
            assert!(seen.insert(h.id.clone()), "holder {} returned twice", h.name);
        }
    }
    assert_eq!(seen.len(), 15);
}

/// Same filters, no writes in between: same result.
#[test]
fn list_is_idempotent() {
    let svc = seeded();
    let q = query(HolderFilter::default().with_search("titular"), 1, 10);
    let a = svc.list(&q).unwrap();
    let b = svc.list(&q).unwrap();
    assert_eq!(a.items, b.items);
    assert_eq!(a.total, b.total);
}

/// A page past the end is empty, not an error, and keeps the total.
#[test]
fn out_of_range_page_is_empty() {
    let svc = seeded();
    let result = svc.list(&query(HolderFilter::default(), 99, 5)).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total, 15);
    assert_eq!(result.page, 99);
}

/// Query-string params clamp instead of failing.
#[test]
fn per_page_and_page_are_clamped() {
    let svc = seeded();
    let cfg = svc.config().pagination;

    let params = ListParams {
        page: Some("-4".into()),
        per_page: Some("1".into()),
        ..ListParams::default()
    };
    let result = svc.list(&params.into_query(&cfg)).unwrap();
    assert_eq!(result.page, 1);
    assert_eq!(result.per_page, 5);

    let params = ListParams {
        per_page: Some("500".into()),
        ..ListParams::default()
    };
    let result = svc.list(&params.into_query(&cfg)).unwrap();
    assert_eq!(result.per_page, 50);
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.items.len(), 15);
}

/// Free text matches name or CI substrings, case-insensitively; blank is ignored.
#[test]
fn search_matches_substrings() {
    let svc = seeded();

    let by_ci = svc
        .list(&query(HolderFilter::default().with_search("V-1"), 1, 50))
        .unwrap();
    // V-1, V-10 .. V-15
    assert_eq!(by_ci.total, 7);

    let by_name = svc
        .list(&query(HolderFilter::default().with_search("TITULAR 0"), 1, 50))
        .unwrap();
    assert_eq!(by_name.total, 9);

    let blank = svc
        .list(&query(HolderFilter::default().with_search("   "), 1, 50))
        .unwrap();
    assert_eq!(blank.total, 15);
}

/// Case folding covers accented letters, not just ASCII.
#[test]
fn search_folds_accented_letters() {
    let svc = service();
    svc.create(NewHolder::new("V-1", "Ángela Núñez", "0414-1")).unwrap();
    svc.create(NewHolder::new("V-2", "Luis Pérez", "0414-2")).unwrap();

    for term in ["Ángela", "ángela", "NÚÑEZ", "núñez", "gELA nú"] {
        let page = svc
            .list(&query(HolderFilter::default().with_search(term), 1, 10))
            .unwrap();
        assert_eq!(page.total, 1, "term {term}");
        assert_eq!(page.items[0].ci, "V-1");
    }
    let none = svc
        .list(&query(HolderFilter::default().with_search("angela"), 1, 10))
        .unwrap();
    assert_eq!(none.total, 0, "accents are significant");
}

/// Lists running while another thread writes never fail on the memory database.
#[test]
fn concurrent_reads_and_writes_succeed() {
    let svc = service();
    std::thread::scope(|s| {
        let writer = s.spawn(|| {
            for i in 0..30 {
                svc.create(holder(i, PolicyStatus::Activo)).unwrap();
            }
        });
        let readers: Vec<_> = (0..3)
            .map(|_| {
                s.spawn(|| {
                    for _ in 0..20 {
                        svc.list(&query(HolderFilter::default(), 1, 10)).unwrap();
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    });
    assert_eq!(svc.list(&query(HolderFilter::default(), 1, 10)).unwrap().total, 30);
}

/// Descending name sort reverses the order.
#[test]
fn name_desc_sort() {
    let svc = seeded();
    let q = ListQuery::new(
        HolderFilter::default(),
        SortKey::NameDesc,
        Pagination { page: 1, per_page: 5 },
    );
    let result = svc.list(&q).unwrap();
    assert_eq!(result.items[0].name, "Titular 15");
}

/// Page stats follow the filter and count linked patients.
#[test]
fn list_stats_follow_filter() {
    let svc = seeded();
    let mut no_patient = holder(16, PolicyStatus::Activo);
    no_patient.create_as_patient = Some(false);
    svc.create(no_patient).unwrap();

    let all = svc.list(&query(HolderFilter::default(), 1, 5)).unwrap();
    assert_eq!(all.stats.active_policies, 13);
    assert_eq!(all.stats.total_patients, 15);
    assert_eq!(all.stats.total_cases, None);

    let inactive = svc
        .list(&query(HolderFilter::default().with_status("Inactivo"), 1, 5))
        .unwrap();
    assert_eq!(inactive.stats.active_policies, 0);
    assert_eq!(inactive.stats.total_patients, 3);
}

/// An empty table lists nothing but still reports one page.
#[test]
fn empty_table_has_one_page() {
    let svc = service();
    let result = svc.list(&query(HolderFilter::default(), 1, 10)).unwrap();
    assert_eq!(result.total, 0);
    assert_eq!(result.total_pages, 1);
}
