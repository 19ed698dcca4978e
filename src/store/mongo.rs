use bson::{Document as BsonDocument, doc};
use futures_util::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use super::{DocumentStore, StoreConnector};
use crate::aggregate::Pipeline;
use crate::config::ConnectionConfig;
use crate::errors::CatalogError;
use crate::index::IndexSpec;
use crate::query::{Filter, FindOptions, filter_document, projection_document, sort_document};

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl StoreConnector for MongoConnector {
    type Store = MongoStore;

    async fn connect(&self, cfg: &ConnectionConfig) -> Result<MongoStore, CatalogError> {
        let connection = |e: mongodb::error::Error| CatalogError::Connection(e.to_string());
        let mut opts = ClientOptions::parse(cfg.uri()).await.map_err(connection)?;
        opts.app_name = Some(cfg.app_name.clone());
        opts.server_selection_timeout = Some(cfg.server_selection_timeout());
        let client = Client::with_options(opts).map_err(connection)?;
        let db = client.database(&cfg.database);
        // The driver connects lazily; ping so an unreachable server fails here.
        if let Err(e) = db.run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(connection(e));
        }
        log::info!("connected to {} db={} collection={}", cfg.uri(), cfg.database, cfg.collection);
        let collection = db.collection::<BsonDocument>(&cfg.collection);
        Ok(MongoStore { client, db, collection })
    }
}

pub struct MongoStore {
    client: Client,
    db: Database,
    collection: Collection<BsonDocument>,
}

impl DocumentStore for MongoStore {
    async fn find(
        &self,
        filter: &Filter,
        opts: &FindOptions,
    ) -> Result<Vec<BsonDocument>, CatalogError> {
        let mut action = self.collection.find(filter_document(filter));
        if let Some(p) = &opts.projection {
            action = action.projection(projection_document(p));
        }
        if let Some(sort) = &opts.sort {
            action = action.sort(sort_document(sort));
        }
        if let Some(skip) = opts.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = opts.limit {
            action = action.limit(limit);
        }
        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, CatalogError> {
        let cursor = self.collection.aggregate(pipeline.to_documents()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String, CatalogError> {
        spec.validate()?;
        let model = IndexModel::builder().keys(spec.key_document()).build();
        let created = self.collection.create_index(model).await?;
        Ok(created.index_name)
    }

    async fn explain_find(&self, filter: &Filter) -> Result<BsonDocument, CatalogError> {
        let command = doc! {
            "explain": { "find": self.collection.name(), "filter": filter_document(filter) },
            "verbosity": "executionStats",
        };
        let reply = self.db.run_command(command).await?;
        reply
            .get_document("executionStats")
            .cloned()
            .map_err(|e| CatalogError::Query(format!("explain reply without executionStats: {e}")))
    }

    async fn close(self) -> Result<(), CatalogError> {
        self.client.shutdown().await;
        log::info!("connection closed");
        Ok(())
    }
}
