//! The query engine: compile, execute, refine, expand.

use serde::Serialize;
use tracing::{debug, info};

use dal_common::{DalError, DalResult};

use crate::constraints::{CompiledQuery, ConstraintCompiler};
use crate::context::RequestContext;
use crate::expand::{RecordExpander, RecordSink};
use crate::fields::FieldDirectory;
use crate::params::ParamSet;
use crate::protocol::Protocol;
use crate::records::{CatalogRow, OutputRecord};
use crate::refine::SpatialRefiner;
use crate::synthesis::MetadataSynthesizer;
use crate::table::TableConfiguration;
use crate::virtual_image::{CutoutRequest, CutoutTask, DatasetLocator, VirtualImageEditor};

/// Runs query text against a catalog.
pub trait QueryExecutor {
    type Handle;
    type Cursor: Iterator<Item = DalResult<CatalogRow>>;

    /// Open a connection or session. Failures map to `ExternalQuery`.
    fn open(&self) -> DalResult<Self::Handle>;

    fn execute(&self, handle: &mut Self::Handle, text: &str) -> DalResult<Self::Cursor>;

    /// Release a handle. Called on every path once a handle was opened.
    fn close(&self, handle: Self::Handle);
}

/// A cursor over rows already fetched into memory.
#[derive(Debug, Clone, Default)]
pub struct RowCursor {
    rows: std::vec::IntoIter<CatalogRow>,
}

impl RowCursor {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for RowCursor {
    type Item = DalResult<CatalogRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Counters of one query run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Rows returned by the catalog.
    pub rows_scanned: usize,
    /// Rows that passed positional refinement.
    pub rows_matched: usize,
    pub records_emitted: usize,
    pub virtual_discarded: usize,
}

/// The result of one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub protocol: Protocol,
    pub directory: FieldDirectory,
    pub records: Vec<OutputRecord>,
    /// Set when the record cap truncated the result.
    pub overflow: bool,
    /// Query text sent to the catalog.
    pub query: String,
    pub stats: QueryStats,
}

impl QueryResponse {
    pub fn query_status(&self) -> &'static str {
        if self.overflow {
            "OVERFLOW"
        } else {
            "OK"
        }
    }

    /// Informational name/value pairs describing the query.
    pub fn infos(&self) -> Vec<(String, String)> {
        vec![
            ("QUERY_STATUS".to_string(), self.query_status().to_string()),
            ("QUERY".to_string(), self.query.clone()),
            ("TableRows".to_string(), self.records.len().to_string()),
        ]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Executes discovery queries for one protocol and service context.
pub struct QueryEngine<'a> {
    protocol: Protocol,
    ctx: &'a RequestContext,
    table: &'a dyn TableConfiguration,
    locator: Option<&'a dyn DatasetLocator>,
    cutout: Option<&'a dyn CutoutTask>,
}

impl<'a> QueryEngine<'a> {
    /// An engine using the context's own table configuration.
    pub fn new(protocol: Protocol, ctx: &'a RequestContext) -> Self {
        Self {
            protocol,
            ctx,
            table: &ctx.table,
            locator: None,
            cutout: None,
        }
    }

    pub fn with_table_configuration(mut self, table: &'a dyn TableConfiguration) -> Self {
        self.table = table;
        self
    }

    /// Enable virtual records.
    pub fn with_virtual_images(
        mut self,
        locator: &'a dyn DatasetLocator,
        cutout: &'a dyn CutoutTask,
    ) -> Self {
        self.locator = Some(locator);
        self.cutout = Some(cutout);
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Fields of the response, honoring VERB over the context's verbosity.
    pub fn field_directory(&self, params: &ParamSet) -> DalResult<FieldDirectory> {
        let verbosity = match params.integer("VERB") {
            Some(v) if v < 0 => {
                return Err(DalError::invalid_parameter("VERB", "must not be negative"))
            }
            Some(v) => Some(u32::try_from(v).unwrap_or(u32::MAX)),
            None => self.ctx.verbosity,
        };
        Ok(FieldDirectory::build(self.protocol, self.table, verbosity))
    }

    /// Validate the context and compile the query.
    pub fn compile(&self, params: &ParamSet) -> DalResult<CompiledQuery> {
        self.ctx.validate_for(self.protocol)?;
        ConstraintCompiler::new(self.protocol, self.table).compile(params, self.ctx)
    }

    /// Run a query end to end.
    pub fn run<E: QueryExecutor>(&self, params: &ParamSet, executor: &E) -> DalResult<QueryResponse> {
        let compiled = self.compile(params)?;
        let directory = self.field_directory(params)?;
        debug!(protocol = %self.protocol, query = %compiled.text, "Executing catalog query");

        let mut handle = executor.open()?;
        let result = executor
            .execute(&mut handle, &compiled.text)
            .and_then(|cursor| self.process(&compiled, params, directory, cursor));
        executor.close(handle);
        result
    }

    /// Refine and expand rows of an executed query into a response.
    pub fn process<I>(
        &self,
        compiled: &CompiledQuery,
        params: &ParamSet,
        directory: FieldDirectory,
        rows: I,
    ) -> DalResult<QueryResponse>
    where
        I: IntoIterator<Item = DalResult<CatalogRow>>,
    {
        let refiner = compiled
            .region
            .map(|region| SpatialRefiner::new(region, self.table));
        let editor = match (self.locator, self.cutout) {
            (Some(locator), Some(task)) => Some(VirtualImageEditor::new(
                locator,
                task,
                CutoutRequest::from_query(compiled),
            )),
            _ => None,
        };

        let synthesizer = MetadataSynthesizer::new(self.protocol, self.ctx, self.table, &directory)
            .with_run_id(params.text("RUNID"));
        let mut expander = RecordExpander::new(self.protocol, self.table, params);
        let mut sink = RecordSink::new(compiled.row_cap);
        let mut stats = QueryStats::default();
        let mut overflow = false;

        if !compiled.is_metadata_only() {
            for row in rows {
                let row = row?;
                stats.rows_scanned += 1;
                if let Some(refiner) = &refiner {
                    if !refiner.accepts(&row) {
                        continue;
                    }
                }
                stats.rows_matched += 1;

                match expander.expand(&row, &synthesizer, editor.as_ref(), &mut sink) {
                    Ok(expansion) => stats.virtual_discarded += expansion.discarded,
                    Err(DalError::Overflow(cap)) => {
                        debug!(cap = cap, "Record cap reached");
                        overflow = true;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        stats.records_emitted = sink.len();
        info!(
            protocol = %self.protocol,
            rows_scanned = stats.rows_scanned,
            rows_matched = stats.rows_matched,
            records = stats.records_emitted,
            overflow = overflow,
            "Query complete"
        );

        Ok(QueryResponse {
            protocol: self.protocol,
            directory,
            records: sink.into_records(),
            overflow,
            query: compiled.text.clone(),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_cursor_yields_ok_rows() {
        let mut cursor = RowCursor::new(vec![CatalogRow::new().with("id", 1)]);
        assert_eq!(cursor.size_hint(), (1, Some(1)));
        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_response_infos() {
        let response = QueryResponse {
            protocol: Protocol::Cone,
            directory: FieldDirectory::new(),
            records: Vec::new(),
            overflow: true,
            query: "SELECT * FROM t".to_string(),
            stats: QueryStats::default(),
        };
        let infos = response.infos();
        assert_eq!(infos[0], ("QUERY_STATUS".to_string(), "OVERFLOW".to_string()));
        assert_eq!(infos[1].1, "SELECT * FROM t");
        assert_eq!(infos[2].1, "0");
    }
}
