//! DAL query service library.
//!
//! Wires a service configuration, the PostgreSQL catalog and the query
//! engine together to answer one discovery request.

pub mod config;
pub mod output;

use tracing::info;

use catalog::{CatalogLocator, PgCatalog};
use dal_common::{DalError, DalResult};
use dal_protocol::{ParamSet, Protocol, QueryEngine, QueryResponse};

use crate::config::ServiceConfig;

/// Parse a `KEY=VALUE` request parameter.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Resolve the protocol from an override or the configured default.
pub fn resolve_protocol(config: &ServiceConfig, requested: Option<&str>) -> DalResult<Protocol> {
    Protocol::from_name(requested.unwrap_or(config.protocol.as_str()))
}

/// Run one request against the catalog.
///
/// Parameters are parsed and the query compiled before connecting, so a
/// malformed request never reaches the database.
pub fn run_query(
    config: &ServiceConfig,
    protocol: Protocol,
    pairs: &[(String, String)],
    database_url: Option<&str>,
) -> DalResult<QueryResponse> {
    let params = ParamSet::parse(protocol, pairs.iter().map(|(k, v)| (k, v)))?;
    let ctx = config.request_context();
    let engine = QueryEngine::new(protocol, &ctx);
    engine.compile(&params)?;

    let database_url = database_url
        .or(config.database.url.as_deref())
        .ok_or_else(|| DalError::MissingParameter("database URL".to_string()))?;
    let catalog = PgCatalog::connect(database_url, config.database.max_connections)?;

    let result = match &config.cutout {
        Some(cutout) if protocol.synthesizes_access() => {
            let locator = CatalogLocator::new(
                &catalog,
                &config.table_name,
                &cutout.id_column,
                &cutout.location_column,
            );
            let task = cutout.task();
            engine
                .with_virtual_images(&locator, &task)
                .run(&params, &catalog)
        }
        _ => engine.run(&params, &catalog),
    };

    catalog.shutdown();
    if let Ok(response) = &result {
        info!(
            protocol = %protocol,
            records = response.len(),
            status = response.query_status(),
            "Request complete"
        );
    }
    result
}
