use bookstore_catalog::store::{MemoryConnector, MemoryStore, MongoConnector};
use bookstore_catalog::{AppConfig, Backend, Catalog, CatalogError, CatalogRunner, ConsoleSink, logger};
use clap::Parser;
use std::process::ExitCode;

/// The target is fixed: mongodb://localhost:27017, database `plp_bookstore`,
/// collection `books`. Override it with `bookstore.toml` or `BOOKSTORE_*` variables.
#[derive(Parser, Debug)]
#[command(name = "bookstore-catalog", version, about = "Run the bookstore query catalog", long_about = None)]
struct Cli {}

async fn run(cfg: &AppConfig) -> Result<bookstore_catalog::RunReport, CatalogError> {
    let runner = CatalogRunner::new(Catalog::bookstore());
    let mut sink = ConsoleSink::stdio();
    match cfg.backend {
        Backend::Mongodb => runner.run(&MongoConnector, &cfg.connection, &mut sink).await,
        Backend::Memory => {
            let store = match &cfg.seed_file {
                Some(p) => MemoryStore::from_json_file(p)?,
                None => MemoryStore::new(),
            };
            runner.run(&MemoryConnector::new(store), &cfg.connection, &mut sink).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logger::configure_logging(&cfg.log);
    log::info!("starting catalog run against {} ({:?} backend)", cfg.connection.uri(), cfg.backend);
    match run(&cfg).await {
        Ok(report) => {
            eprintln!("\n{}", report.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("run aborted: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
