mod common;

use bson::{Bson, doc};
use bookstore_catalog::render::CollectingSink;
use bookstore_catalog::store::{MemoryConnector, MemoryStore};
use bookstore_catalog::{
    Catalog, CatalogError, CatalogRunner, ConnectionConfig, ConsoleSink, OperationReport, Outcome,
    ReportSink, RunReport,
};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

async fn run_on(store: &MemoryStore) -> RunReport {
    let mut sink = CollectingSink::default();
    CatalogRunner::new(Catalog::bookstore())
        .run(&MemoryConnector::new(store.clone()), &ConnectionConfig::default(), &mut sink)
        .await
        .unwrap()
}

fn docs(report: &RunReport, i: usize) -> &[bson::Document] {
    report.operations[i]
        .outcome
        .as_ref()
        .ok()
        .and_then(Outcome::documents)
        .unwrap_or_else(|| panic!("operation {i} did not return documents"))
}

/// Panics when asked to report the named operation.
struct FailingSink(&'static str);

impl ReportSink for FailingSink {
    fn section(&mut self, _title: &str) {}

    fn operation(&mut self, report: &OperationReport) {
        if report.name == self.0 {
            panic!("sink failed on {}", report.name);
        }
    }
}

fn price(d: &bson::Document) -> f64 {
    d.get_f64("price").unwrap()
}

#[tokio::test]
async fn every_operation_reports_and_connection_closes_once() {
    let store = common::bookstore();
    let report = run_on(&store).await;
    assert_eq!(report.len(), 16);
    assert_eq!(report.failed(), 0, "{report:?}");
    assert_eq!(store.close_count(), 1);
    let names: Vec<&str> = report.operations.iter().map(|o| o.name.as_str()).collect();
    let catalog = Catalog::bookstore();
    let expected: Vec<&str> = catalog.operations().iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn basic_filters() {
    let report = run_on(&common::bookstore()).await;
    assert_eq!(docs(&report, 0).len(), common::BOOKS.len());
    let orwell = docs(&report, 1);
    assert_eq!(orwell.len(), 2);
    assert!(orwell.iter().all(|d| d.get_str("author").unwrap() == "George Orwell"));
    assert!(docs(&report, 2).iter().all(|d| d.get_i32("published_year").unwrap() > 1950));
    assert_eq!(docs(&report, 2).len(), 8);
    assert!(docs(&report, 3).iter().all(|d| d.get_str("genre").unwrap() == "Fiction"));
    assert!(docs(&report, 4).iter().all(|d| d.get_bool("in_stock").unwrap()));
}

#[tokio::test]
async fn recent_in_stock_books_are_projected_without_id() {
    let report = run_on(&common::bookstore()).await;
    let recent = docs(&report, 5);
    assert_eq!(
        recent,
        &[
            doc! {"title": "The Martian", "author": "Andy Weir", "price": 15.0},
            doc! {"title": "Project Hail Mary", "author": "Andy Weir", "price": 18.5},
        ]
    );
}

#[tokio::test]
async fn price_sorts_are_monotonic() {
    let report = run_on(&common::bookstore()).await;
    let asc = docs(&report, 6);
    let desc = docs(&report, 7);
    assert_eq!(asc.len(), common::BOOKS.len());
    assert!(asc.windows(2).all(|w| price(&w[0]) <= price(&w[1])));
    assert!(desc.windows(2).all(|w| price(&w[0]) >= price(&w[1])));
    assert!(asc.iter().all(|d| !d.contains_key("_id") && d.len() == 3));
}

#[tokio::test]
async fn pages_are_disjoint_and_cover_first_ten() {
    let store = common::bookstore();
    let report = run_on(&store).await;
    let page1 = docs(&report, 8);
    let page2 = docs(&report, 9);
    assert_eq!(page1.len(), 5);
    assert_eq!(page2.len(), 5);
    assert!(page1.iter().all(|d| !page2.contains(d)));
    let joined: Vec<_> = page1.iter().chain(page2).cloned().collect();
    assert_eq!(joined, store.documents()[..10].to_vec());
}

#[tokio::test]
async fn average_price_matches_arithmetic_mean_per_genre() {
    let report = run_on(&common::bookstore()).await;
    let mut expected: HashMap<&str, (f64, f64)> = HashMap::new();
    for &(_, _, _, genre, price, _) in common::BOOKS {
        let e = expected.entry(genre).or_default();
        e.0 += price;
        e.1 += 1.0;
    }
    let groups = docs(&report, 10);
    assert_eq!(groups.len(), expected.len());
    for g in groups {
        let genre = g.get_str("_id").unwrap();
        let (sum, n) = expected[genre];
        assert!((g.get_f64("averagePrice").unwrap() - sum / n).abs() < 1e-9, "{genre}");
    }
}

#[tokio::test]
async fn top_author_has_the_maximum_count() {
    let report = run_on(&common::bookstore()).await;
    let top = docs(&report, 11);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].get_i32("count").unwrap(), 2);
    // three authors tie at two books; any of them may win
    let winner = top[0].get_str("_id").unwrap();
    assert!(["George Orwell", "J.R.R. Tolkien", "Andy Weir"].contains(&winner));
}

#[tokio::test]
async fn decades_are_bucketed_and_ascending() {
    let report = run_on(&common::bookstore()).await;
    let decades = docs(&report, 12);
    let as_num = |b: &Bson| match b {
        Bson::Double(f) => *f,
        Bson::Int32(i) => f64::from(*i),
        other => panic!("non-numeric decade {other}"),
    };
    let values: Vec<f64> = decades.iter().map(|d| as_num(d.get("decade").unwrap())).collect();
    assert!(values.windows(2).all(|w| w[0] < w[1]));
    let eighties = decades.iter().find(|d| as_num(d.get("decade").unwrap()) == 1980.0).unwrap();
    // Beloved (1987) and The Alchemist (1988)
    assert_eq!(eighties.get_i32("count").unwrap(), 2);
    assert!(decades.iter().all(|d| !d.contains_key("_id")));
    let total: i32 = decades.iter().map(|d| d.get_i32("count").unwrap()).sum();
    assert_eq!(usize::try_from(total).unwrap(), common::BOOKS.len());
}

#[tokio::test]
async fn index_creation_is_idempotent_across_runs() {
    let store = common::bookstore();
    let first = run_on(&store).await;
    let second = run_on(&store).await;
    for report in [&first, &second] {
        assert_eq!(report.operations[13].outcome.as_ref().unwrap(), &Outcome::IndexName("title_1".into()));
        assert_eq!(
            report.operations[14].outcome.as_ref().unwrap(),
            &Outcome::IndexName("author_1_published_year_1".into())
        );
    }
    assert_eq!(store.index_names(), vec!["_id_", "title_1", "author_1_published_year_1"]);
    assert_eq!(store.close_count(), 2);
}

#[tokio::test]
async fn explain_reports_index_scan_statistics() {
    let report = run_on(&common::bookstore()).await;
    let Ok(Outcome::Stats(stats)) = &report.operations[15].outcome else {
        panic!("explain did not return stats");
    };
    assert_eq!(stats.get_i64("nReturned").unwrap(), 1);
    assert_eq!(stats.get_i64("totalKeysExamined").unwrap(), 1);
    assert_eq!(stats.get_i64("totalDocsExamined").unwrap(), 1);
    assert!(stats.get_i64("executionTimeMillis").unwrap() >= 0);
    let input = stats.get_document("executionStages").unwrap().get_document("inputStage").unwrap();
    assert_eq!(input.get_str("stage").unwrap(), "IXSCAN");
}

#[tokio::test]
async fn failing_operation_does_not_stop_the_run() {
    let store = common::bookstore();
    store.insert(doc! {"title": "Untitled", "author": "Anon", "published_year": "unknown", "price": 1.0});
    let report = run_on(&store).await;
    assert_eq!(report.len(), 16);
    assert_eq!(report.failed(), 1);
    let failed = report.get("Books grouped by publication decade").unwrap();
    assert!(matches!(failed.outcome, Err(CatalogError::Query(_))));
    assert!(report.operations[13..].iter().all(|o| o.is_ok()));
    assert_eq!(store.close_count(), 1);
}

#[tokio::test]
async fn panic_mid_run_still_closes_the_connection() {
    let store = common::bookstore();
    let connector = MemoryConnector::new(store.clone());
    let runner = CatalogRunner::new(Catalog::bookstore());
    let mut sink = FailingSink("Fiction books");
    let r = AssertUnwindSafe(runner.run(&connector, &ConnectionConfig::default(), &mut sink))
        .catch_unwind()
        .await;
    let payload = r.err().expect("run should propagate the panic");
    assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("sink failed on Fiction books"));
    assert_eq!(store.close_count(), 1);
}

#[tokio::test]
async fn unreachable_store_is_fatal() {
    let mut sink = CollectingSink::default();
    let r = CatalogRunner::new(Catalog::bookstore())
        .run(&MemoryConnector::unreachable(), &ConnectionConfig::default(), &mut sink)
        .await;
    assert!(matches!(r, Err(CatalogError::Connection(_))));
    assert!(sink.events.is_empty());
}

#[tokio::test]
async fn console_output_is_in_catalog_order() {
    let mut sink = ConsoleSink::new(Vec::new(), Vec::new());
    CatalogRunner::new(Catalog::bookstore())
        .run(&MemoryConnector::new(common::bookstore()), &ConnectionConfig::default(), &mut sink)
        .await
        .unwrap();
    let (out, err) = sink.into_inner();
    let out = String::from_utf8(out).unwrap();
    assert!(err.is_empty());
    let mut from = 0;
    for op in Catalog::bookstore().operations() {
        let at = out[from..].find(&op.name).map(|i| i + from);
        assert!(at.is_some(), "missing or out of order: {}", op.name);
        from = at.unwrap_or(from);
    }
    assert!(out.starts_with("Task 2: Basic Queries\n"));
}
