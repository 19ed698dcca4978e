use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use crate::catalog::{Catalog, OperationKind};
use crate::config::ConnectionConfig;
use crate::errors::CatalogError;
use crate::logger::AUDIT_TARGET;
use crate::render::ReportSink;
use crate::store::{DocumentStore, StoreConnector};
use bson::Document as BsonDocument;

/// Materialized result of one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Documents(Vec<BsonDocument>),
    IndexName(String),
    Stats(BsonDocument),
}

impl Outcome {
    #[must_use]
    pub fn documents(&self) -> Option<&[BsonDocument]> {
        match self {
            Self::Documents(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct OperationReport {
    pub section: &'static str,
    pub name: String,
    pub outcome: Result<Outcome, CatalogError>,
    pub elapsed: Duration,
}

impl OperationReport {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Ordered record of a run: one entry per catalog operation.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub operations: Vec<OperationReport>,
}

impl RunReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.operations.iter().filter(|o| o.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OperationReport> {
        self.operations.iter().find(|o| o.name == name)
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let ms = (self.finished_at - self.started_at).num_milliseconds();
        format!(
            "{} operations: {} succeeded, {} failed in {ms} ms",
            self.len(),
            self.succeeded(),
            self.failed()
        )
    }
}

/// Sole owner of an open store for the duration of a run.
struct Session<S: DocumentStore> {
    store: Option<S>,
}

impl<S: DocumentStore> Session<S> {
    const fn new(store: S) -> Self {
        Self { store: Some(store) }
    }

    fn store(&self) -> Result<&S, CatalogError> {
        self.store
            .as_ref()
            .ok_or_else(|| CatalogError::Connection("connection already released".into()))
    }

    async fn release(mut self) -> Result<(), CatalogError> {
        match self.store.take() {
            Some(store) => store.close().await,
            None => Ok(()),
        }
    }
}

impl<S: DocumentStore> Drop for Session<S> {
    fn drop(&mut self) {
        if self.store.take().is_some() {
            // the run future was cancelled; dropping the handle releases driver resources
            log::warn!("connection dropped without orderly close");
        }
    }
}

/// Sends one operation to the store and waits for the materialized result.
///
/// # Errors
/// Returns whatever the store rejects the request with.
pub async fn execute<S: DocumentStore>(
    store: &S,
    kind: &OperationKind,
) -> Result<Outcome, CatalogError> {
    match kind {
        OperationKind::Find { .. }
        | OperationKind::FindWithProjection { .. }
        | OperationKind::FindSorted { .. }
        | OperationKind::FindPaginated { .. } => {
            let Some((filter, opts)) = kind.find_request() else {
                return Err(CatalogError::InvalidOperation(kind.label().into()));
            };
            store.find(&filter, &opts).await.map(Outcome::Documents)
        }
        OperationKind::Aggregate { pipeline } => {
            store.aggregate(pipeline).await.map(Outcome::Documents)
        }
        OperationKind::CreateIndex { spec } => {
            store.create_index(spec).await.map(Outcome::IndexName)
        }
        OperationKind::Explain { filter } => store.explain_find(filter).await.map(Outcome::Stats),
    }
}

pub struct CatalogRunner {
    catalog: Catalog,
}

impl CatalogRunner {
    #[must_use]
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Connects, runs every operation in order, and closes the connection once.
    ///
    /// Per-operation failures are captured in the report and do not stop the run.
    ///
    /// # Errors
    /// Returns `CatalogError::Config` for an invalid target and `CatalogError::Connection`
    /// when no connection can be established.
    pub async fn run<C, K>(
        &self,
        connector: &C,
        cfg: &ConnectionConfig,
        sink: &mut K,
    ) -> Result<RunReport, CatalogError>
    where
        C: StoreConnector,
        K: ReportSink,
    {
        cfg.validate()?;
        let started_at = Utc::now();
        let session = match connector.connect(cfg).await {
            Ok(store) => Session::new(store),
            Err(e) => {
                log::error!("connect to {} failed: {e}", cfg.uri());
                return Err(e);
            }
        };
        let looped = AssertUnwindSafe(self.run_operations(&session, sink)).catch_unwind().await;
        if let Err(e) = session.release().await {
            log::warn!("close failed: {e}");
        }
        let operations = match looped {
            Ok(operations) => operations,
            Err(payload) => {
                log::error!("run aborted by a panic; connection released");
                std::panic::resume_unwind(payload)
            }
        };
        let report = RunReport { started_at, finished_at: Utc::now(), operations };
        log::info!("{}", report.summary());
        Ok(report)
    }

    async fn run_operations<S, K>(&self, session: &Session<S>, sink: &mut K) -> Vec<OperationReport>
    where
        S: DocumentStore,
        K: ReportSink,
    {
        let mut operations = Vec::with_capacity(self.catalog.len());
        let mut section: Option<&'static str> = None;
        for op in self.catalog.operations() {
            if section != Some(op.section) {
                sink.section(op.section);
                section = Some(op.section);
            }
            let start = Instant::now();
            let outcome = match session.store() {
                Ok(store) => execute(store, &op.kind).await,
                Err(e) => Err(e),
            };
            let report = OperationReport {
                section: op.section,
                name: op.name.clone(),
                outcome,
                elapsed: start.elapsed(),
            };
            match &report.outcome {
                Ok(_) => log::info!(
                    target: AUDIT_TARGET,
                    "op={:?} kind={} status=ok elapsed_ms={}",
                    op.name,
                    op.kind.label(),
                    report.elapsed.as_millis()
                ),
                Err(e) => {
                    log::info!(
                        target: AUDIT_TARGET,
                        "op={:?} kind={} status=err elapsed_ms={}",
                        op.name,
                        op.kind.label(),
                        report.elapsed.as_millis()
                    );
                    log::error!("{} failed: {e}", op.name);
                }
            }
            sink.operation(&report);
            operations.push(report);
        }
        operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Operation;
    use crate::query::Filter;
    use crate::render::CollectingSink;
    use crate::store::{MemoryConnector, MemoryStore};
    use bson::doc;

    #[tokio::test]
    async fn bad_config_fails_before_connecting() {
        let connector = MemoryConnector::new(MemoryStore::new());
        let cfg = ConnectionConfig { collection: String::new(), ..ConnectionConfig::default() };
        let mut sink = CollectingSink::default();
        let r = CatalogRunner::new(Catalog::bookstore()).run(&connector, &cfg, &mut sink).await;
        assert!(matches!(r, Err(CatalogError::Config(_))));
        assert_eq!(connector.store().close_count(), 0);
        assert!(sink.events.is_empty());
    }

    #[tokio::test]
    async fn sections_are_announced_once_each() {
        let store = MemoryStore::with_documents(vec![doc! {"title": "1984"}]);
        let catalog = Catalog::new(vec![
            Operation::new("A", "one", OperationKind::Find { filter: Filter::True }),
            Operation::new("A", "two", OperationKind::Find { filter: Filter::True }),
            Operation::new("B", "three", OperationKind::Explain { filter: Filter::eq("title", "1984") }),
        ]);
        let mut sink = CollectingSink::default();
        let report = CatalogRunner::new(catalog)
            .run(&MemoryConnector::new(store.clone()), &ConnectionConfig::default(), &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.events, vec!["section A", "op one ok", "op two ok", "section B", "op three ok"]);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(store.close_count(), 1);
        assert!(matches!(report.get("three").unwrap().outcome, Ok(Outcome::Stats(_))));
    }
}
