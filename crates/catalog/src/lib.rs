//! PostgreSQL catalog backend for the DAL query engine.
//!
//! Provides:
//! - [`PgCatalog`], a [`QueryExecutor`](dal_protocol::QueryExecutor) that runs
//!   compiled query text against a PostgreSQL database
//! - [`CatalogLocator`], a [`DatasetLocator`](dal_protocol::DatasetLocator)
//!   resolving dataset identifiers to archival files through a table column

pub mod executor;
pub mod locator;

pub use executor::{CatalogCursor, CatalogSession, PgCatalog, DEFAULT_MAX_CONNECTIONS, FETCH_BATCH};
pub use locator::CatalogLocator;
