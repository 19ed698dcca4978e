//! Runs a fixed catalog of queries, aggregations and index builds against the
//! `plp_bookstore.books` collection and reports each result in order.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod render;
pub mod runner;
pub mod store;

pub use catalog::{Catalog, Operation, OperationKind};
pub use config::{AppConfig, Backend, ConnectionConfig};
pub use errors::CatalogError;
pub use render::{ConsoleSink, ReportSink};
pub use runner::{CatalogRunner, OperationReport, Outcome, RunReport};
