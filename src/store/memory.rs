use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument, doc};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::{DocumentStore, StoreConnector};
use crate::aggregate::{Pipeline, run_pipeline};
use crate::config::ConnectionConfig;
use crate::errors::CatalogError;
use crate::index::{IndexManager, IndexSpec};
use crate::query::{
    Filter, FindOptions, apply_projection, compare_docs, eval_filter, filter_document,
};

#[derive(Default)]
struct Inner {
    docs: RwLock<Vec<BsonDocument>>,
    indexes: RwLock<IndexManager>,
    closes: AtomicUsize,
}

/// In-process collection with the store's observable semantics: natural (insertion)
/// order, stable sorts, idempotent index builds and execution statistics.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_documents(docs: Vec<BsonDocument>) -> Self {
        let store = Self::new();
        for d in docs {
            store.insert(d);
        }
        store
    }

    /// Loads a JSON array of documents (relaxed extended JSON is accepted).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a JSON array, or holds non-objects.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&text)?;
        let store = Self::new();
        for (i, v) in values.into_iter().enumerate() {
            match Bson::try_from(v) {
                Ok(Bson::Document(d)) => {
                    store.insert(d);
                }
                Ok(other) => {
                    return Err(CatalogError::InvalidOperation(format!(
                        "seed entry {i} is not a document: {other}"
                    )));
                }
                Err(e) => {
                    return Err(CatalogError::InvalidOperation(format!("seed entry {i}: {e}")));
                }
            }
        }
        log::info!("seeded memory store from {} ({} documents)", path.display(), store.len());
        Ok(store)
    }

    /// Appends a document, assigning an `_id` first when it has none.
    pub fn insert(&self, doc: BsonDocument) -> Bson {
        let doc = if doc.contains_key("_id") {
            doc
        } else {
            let mut with_id = doc! { "_id": ObjectId::new() };
            with_id.extend(doc);
            with_id
        };
        let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        let mut docs = self.inner.docs.write();
        self.inner.indexes.write().insert_all(&doc, docs.len());
        docs.push(doc);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn documents(&self) -> Vec<BsonDocument> {
        self.inner.docs.read().clone()
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names = vec!["_id_".to_string()];
        names.extend(self.inner.indexes.read().names());
        names
    }

    /// Number of times `close` has been called on any handle to this store.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Candidate positions for `filter`, via the first usable index, plus keys examined.
    fn plan(&self, filter: &Filter) -> Option<(String, BsonDocument, Vec<usize>, usize)> {
        let mgr = self.inner.indexes.read();
        for (path, value) in filter.equality_paths() {
            if let Some(idx) = mgr.leading_on(path) {
                let (positions, keys) = idx.lookup_prefix_eq(value);
                return Some((idx.spec.name(), idx.spec.key_document(), positions, keys));
            }
        }
        None
    }

    fn matching(&self, filter: &Filter) -> (Vec<BsonDocument>, usize) {
        let docs = self.inner.docs.read();
        match self.plan(filter) {
            Some((_, _, positions, _)) => {
                let examined = positions.len();
                let hits = positions
                    .into_iter()
                    .filter_map(|p| docs.get(p))
                    .filter(|d| eval_filter(d, filter))
                    .cloned()
                    .collect();
                (hits, examined)
            }
            None => {
                let hits = docs.iter().filter(|d| eval_filter(d, filter)).cloned().collect();
                (hits, docs.len())
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<BsonDocument>, CatalogError> {
        let (mut docs, _) = self.matching(filter);
        if let Some(sort) = &opts.sort {
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }
        let skip = usize::try_from(opts.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        // limit 0 means no limit; a negative limit behaves like its absolute value
        let limit = match opts.limit.map(i64::unsigned_abs) {
            None | Some(0) => usize::MAX,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let docs = docs.into_iter().skip(skip).take(limit);
        Ok(match &opts.projection {
            Some(p) => docs.map(|d| apply_projection(&d, p)).collect(),
            None => docs.collect(),
        })
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, CatalogError> {
        run_pipeline(self.documents(), pipeline)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String, CatalogError> {
        let docs = self.inner.docs.read();
        let (name, built) = self.inner.indexes.write().create_index(spec, &docs)?;
        if built {
            log::info!("built index {name} over {} documents", docs.len());
        }
        Ok(name)
    }

    async fn explain_find(&self, filter: &Filter) -> Result<BsonDocument, CatalogError> {
        let start = Instant::now();
        let plan = self.plan(filter);
        let (hits, docs_examined) = self.matching(filter);
        let millis = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
        let n = i64::try_from(hits.len()).unwrap_or(i64::MAX);
        let docs_examined = i64::try_from(docs_examined).unwrap_or(i64::MAX);
        let (keys_examined, stages) = match plan {
            Some((name, key_pattern, _, keys)) => {
                let keys = i64::try_from(keys).unwrap_or(i64::MAX);
                let stages = doc! {
                    "stage": "FETCH",
                    "nReturned": n,
                    "docsExamined": docs_examined,
                    "inputStage": {
                        "stage": "IXSCAN",
                        "nReturned": keys,
                        "keyPattern": key_pattern,
                        "indexName": name,
                        "keysExamined": keys,
                    },
                };
                (keys, stages)
            }
            None => {
                let stages = doc! {
                    "stage": "COLLSCAN",
                    "filter": filter_document(filter),
                    "nReturned": n,
                    "docsExamined": docs_examined,
                };
                (0, stages)
            }
        };
        Ok(doc! {
            "executionSuccess": true,
            "nReturned": n,
            "executionTimeMillis": millis,
            "totalKeysExamined": keys_examined,
            "totalDocsExamined": docs_examined,
            "executionStages": stages,
        })
    }

    async fn close(self) -> Result<(), CatalogError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out handles to one shared `MemoryStore`.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    unreachable: bool,
}

impl MemoryConnector {
    #[must_use]
    pub const fn new(store: MemoryStore) -> Self {
        Self { store, unreachable: false }
    }

    /// A connector whose every connect attempt fails.
    #[must_use]
    pub fn unreachable() -> Self {
        Self { store: MemoryStore::new(), unreachable: true }
    }

    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self, cfg: &ConnectionConfig) -> Result<MemoryStore, CatalogError> {
        if self.unreachable {
            return Err(CatalogError::Connection(format!("{} is unreachable", cfg.uri())));
        }
        log::info!("attached memory store db={} collection={}", cfg.database, cfg.collection);
        Ok(self.store.clone())
    }
}
