mod common;

use bookstore_catalog::render::CollectingSink;
use bookstore_catalog::store::{MemoryConnector, MemoryStore};
use bookstore_catalog::{Catalog, CatalogError, CatalogRunner, ConnectionConfig};
use std::io::Write;

#[tokio::test]
async fn seeded_store_runs_the_full_catalog() {
    let values: Vec<serde_json::Value> = common::book_documents()
        .into_iter()
        .map(|d| bson::Bson::Document(d).into_relaxed_extjson())
        .collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&values).unwrap()).unwrap();

    let store = MemoryStore::from_json_file(file.path()).unwrap();
    assert_eq!(store.len(), common::BOOKS.len());
    // integers stay integers so year comparisons and decade math behave
    assert_eq!(store.documents()[0].get_i32("published_year").unwrap(), 1960);

    let mut sink = CollectingSink::default();
    let report = CatalogRunner::new(Catalog::bookstore())
        .run(&MemoryConnector::new(store.clone()), &ConnectionConfig::default(), &mut sink)
        .await
        .unwrap();
    assert_eq!(report.len(), 16);
    assert_eq!(report.failed(), 0);
    assert_eq!(store.close_count(), 1);
}

#[test]
fn seed_must_be_an_array_of_objects() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[{{\"title\": \"ok\"}}, 7]").unwrap();
    let r = MemoryStore::from_json_file(file.path());
    assert!(matches!(r, Err(CatalogError::InvalidOperation(_))));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"title\": \"not an array\"}}").unwrap();
    assert!(matches!(MemoryStore::from_json_file(file.path()), Err(CatalogError::Json(_))));

    let missing = std::env::temp_dir().join("bookstore_catalog_missing_seed.json");
    assert!(matches!(MemoryStore::from_json_file(&missing), Err(CatalogError::Io(_))));
}
