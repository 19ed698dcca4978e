//! Request/response interface to the document store.
//!
//! `MongoStore` talks to a live server through the driver; `MemoryStore` is an
//! in-process store with the same contract, used offline and in tests.

mod memory;
mod mongo;

pub use memory::{MemoryConnector, MemoryStore};
pub use mongo::{MongoConnector, MongoStore};

use crate::aggregate::Pipeline;
use crate::config::ConnectionConfig;
use crate::errors::CatalogError;
use crate::index::IndexSpec;
use crate::query::{Filter, FindOptions};
use bson::Document as BsonDocument;

/// One open connection bound to a single collection.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Fully materialized result of a filtered find.
    async fn find(
        &self,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<BsonDocument>, CatalogError>;

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, CatalogError>;

    /// Idempotent; returns the index name.
    async fn create_index(&self, spec: &IndexSpec) -> Result<String, CatalogError>;

    /// Runs the find in `executionStats` mode and returns the stats document.
    async fn explain_find(&self, filter: &Filter) -> Result<BsonDocument, CatalogError>;

    async fn close(self) -> Result<(), CatalogError>;
}

#[allow(async_fn_in_trait)]
pub trait StoreConnector {
    type Store: DocumentStore;

    async fn connect(&self, cfg: &ConnectionConfig) -> Result<Self::Store, CatalogError>;
}
