//! Query execution against PostgreSQL.
//!
//! The engine is synchronous, so the catalog owns a small runtime and
//! blocks on each database call. Rows are streamed through a server-side
//! cursor so a request that stops at its record cap stops the scan too.

use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use dal_common::{DalError, DalResult};
use dal_protocol::{CatalogRow, QueryExecutor};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Rows fetched from the server per round trip.
pub const FETCH_BATCH: usize = 500;

const CURSOR_NAME: &str = "dal_rows";

/// Database connection pool used to run catalog queries.
pub struct PgCatalog {
    runtime: Arc<Runtime>,
    pool: PgPool,
}

/// One query session. Sessions only track timing; connections are taken
/// from the pool by each cursor.
#[derive(Debug)]
pub struct CatalogSession {
    opened: Instant,
    statements: usize,
}

impl PgCatalog {
    /// Connect to the database at `database_url`.
    pub fn connect(database_url: &str, max_connections: u32) -> DalResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DalError::Internal(format!("cannot start runtime: {}", e)))?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(database_url),
            )
            .map_err(|e| DalError::external_query(format!("connection failed: {}", e)))?;

        info!(max_connections = max_connections, "Connected to catalog database");
        Ok(Self {
            runtime: Arc::new(runtime),
            pool,
        })
    }

    /// Start a query and return a cursor over its rows.
    ///
    /// The cursor holds one pooled connection inside a read transaction
    /// until it is exhausted or dropped.
    pub fn open_cursor(&self, text: &str) -> DalResult<CatalogCursor> {
        let declare = declare_cursor_query(text);
        let tx = self
            .runtime
            .block_on(async {
                let mut tx = self.pool.begin().await?;
                sqlx::Executor::execute(&mut *tx, declare.as_str()).await?;
                Ok::<_, sqlx::Error>(tx)
            })
            .map_err(|e| DalError::external_query(format!("query failed: {}", e)))?;

        Ok(CatalogCursor {
            runtime: Arc::clone(&self.runtime),
            tx: Some(tx),
            buffer: VecDeque::new(),
            exhausted: false,
            fetched: 0,
        })
    }

    /// Run a query returning at most one text value.
    pub fn fetch_text(&self, text: &str, bind: &str) -> DalResult<Option<String>> {
        let value = self
            .runtime
            .block_on(
                sqlx::query_scalar::<_, Option<String>>(text)
                    .bind(bind)
                    .fetch_optional(&self.pool),
            )
            .map_err(|e| DalError::external_query(format!("query failed: {}", e)))?;
        Ok(value.flatten())
    }

    /// Close all pooled connections.
    pub fn shutdown(self) {
        self.runtime.block_on(self.pool.close());
        debug!("Catalog pool closed");
    }
}

impl QueryExecutor for PgCatalog {
    type Handle = CatalogSession;
    type Cursor = CatalogCursor;

    fn open(&self) -> DalResult<CatalogSession> {
        if self.pool.is_closed() {
            return Err(DalError::external_query("catalog pool is closed"));
        }
        Ok(CatalogSession {
            opened: Instant::now(),
            statements: 0,
        })
    }

    fn execute(&self, session: &mut CatalogSession, text: &str) -> DalResult<CatalogCursor> {
        session.statements += 1;
        self.open_cursor(text)
    }

    fn close(&self, session: CatalogSession) {
        debug!(
            statements = session.statements,
            elapsed_ms = session.opened.elapsed().as_millis() as u64,
            "Catalog session closed"
        );
    }
}

/// Rows of a running catalog query, fetched in batches of [`FETCH_BATCH`].
pub struct CatalogCursor {
    runtime: Arc<Runtime>,
    tx: Option<Transaction<'static, Postgres>>,
    buffer: VecDeque<String>,
    exhausted: bool,
    fetched: usize,
}

impl CatalogCursor {
    /// Rows received from the server so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    fn fill(&mut self) -> DalResult<()> {
        let Some(tx) = self.tx.as_mut() else {
            self.exhausted = true;
            return Ok(());
        };
        let fetch = fetch_batch_query();
        let batch = self
            .runtime
            .block_on(sqlx::query_scalar::<_, String>(&fetch).fetch_all(&mut **tx))
            .map_err(|e| DalError::external_query(format!("fetch failed: {}", e)))?;

        self.fetched += batch.len();
        if batch.len() < FETCH_BATCH {
            self.exhausted = true;
            self.release();
        }
        self.buffer.extend(batch);
        Ok(())
    }

    /// End the read transaction and return the connection to the pool.
    fn release(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = self.runtime.block_on(tx.rollback()) {
                warn!(error = %e, "Failed to release catalog cursor");
            }
            debug!(rows = self.fetched, "Catalog cursor released");
        }
    }
}

impl Iterator for CatalogCursor {
    type Item = DalResult<CatalogRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                self.release();
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(|json| parse_row(&json))
    }
}

impl Drop for CatalogCursor {
    fn drop(&mut self) {
        self.release();
    }
}

/// Declare the server-side cursor for a query.
pub fn declare_cursor_query(text: &str) -> String {
    format!(
        "DECLARE {} NO SCROLL CURSOR FOR {}",
        CURSOR_NAME,
        json_rows_query(text)
    )
}

fn fetch_batch_query() -> String {
    format!("FETCH {} FROM {}", FETCH_BATCH, CURSOR_NAME)
}

/// Wrap query text so that each row comes back as one JSON object.
pub fn json_rows_query(text: &str) -> String {
    let inner = text.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q)::text FROM ({}) AS q", inner)
}

/// Parse one `row_to_json` result into a catalog row.
pub fn parse_row(json: &str) -> DalResult<CatalogRow> {
    let map: Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| DalError::external_query(format!("unreadable catalog row: {}", e)))?;
    Ok(CatalogRow::from(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rows_query() {
        assert_eq!(
            json_rows_query("SELECT * FROM images WHERE (1 = 0);\n"),
            "SELECT row_to_json(q)::text FROM (SELECT * FROM images WHERE (1 = 0)) AS q"
        );
    }

    #[test]
    fn test_cursor_statements() {
        assert_eq!(
            declare_cursor_query("SELECT * FROM images"),
            "DECLARE dal_rows NO SCROLL CURSOR FOR \
             SELECT row_to_json(q)::text FROM (SELECT * FROM images) AS q"
        );
        assert_eq!(fetch_batch_query(), "FETCH 500 FROM dal_rows");
    }

    #[test]
    fn test_parse_row() {
        let row = parse_row(r#"{"id": "m31", "s_ra": 10.68, "t_min": null}"#).unwrap();
        assert_eq!(row.text("id").as_deref(), Some("m31"));
        assert_eq!(row.f64("s_ra"), Some(10.68));
        assert_eq!(row.text("t_min"), None);
    }

    #[test]
    fn test_parse_row_rejects_non_objects() {
        let err = parse_row("[1, 2]").unwrap_err();
        assert!(matches!(err, DalError::ExternalQuery(_)));
    }
}
