//! Per-request service context.

use serde::{Deserialize, Serialize};

use dal_common::{DalError, DalResult};

use crate::protocol::Protocol;
use crate::table::TableConfig;

/// Default cap on output records per request.
pub const DEFAULT_MAX_RECORDS: usize = 1000;

/// Service-side settings that shape one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// IVOA authority used to build publisher dataset identifiers.
    pub authority_id: Option<String>,
    /// Base URL of the service, without the service name.
    pub base_url: Option<String>,
    pub service_name: Option<String>,
    pub run_id: Option<String>,
    pub table_name: Option<String>,
    pub verbosity: Option<u32>,
    pub max_records: usize,
    /// Column mapping and field policy for the queried table.
    #[serde(default)]
    pub table: TableConfig,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            authority_id: None,
            base_url: None,
            service_name: None,
            run_id: None,
            table_name: None,
            verbosity: None,
            max_records: DEFAULT_MAX_RECORDS,
            table: TableConfig::default(),
        }
    }
}

impl RequestContext {
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    pub fn require_table(&self) -> DalResult<&str> {
        require(&self.table_name, "table name")
    }

    pub fn require_authority(&self) -> DalResult<&str> {
        require(&self.authority_id, "authority ID")
    }

    pub fn require_base_url(&self) -> DalResult<&str> {
        require(&self.base_url, "base URL")
    }

    pub fn require_service_name(&self) -> DalResult<&str> {
        require(&self.service_name, "service name")
    }

    /// Check the settings a protocol needs before any query is built.
    pub fn validate_for(&self, protocol: Protocol) -> DalResult<()> {
        self.require_table()?;
        if protocol.synthesizes_access() {
            self.require_authority()?;
            self.require_base_url()?;
            self.require_service_name()?;
        }
        Ok(())
    }
}

fn require<'a>(value: &'a Option<String>, what: &str) -> DalResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DalError::MissingParameter(what.to_string())),
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug, Clone, Default)]
pub struct RequestContextBuilder {
    ctx: RequestContext,
}

impl RequestContextBuilder {
    pub fn authority_id(mut self, authority: impl Into<String>) -> Self {
        self.ctx.authority_id = Some(authority.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.ctx.base_url = Some(url.into());
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.ctx.service_name = Some(name.into());
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.ctx.run_id = Some(run_id.into());
        self
    }

    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.ctx.table_name = Some(table.into());
        self
    }

    pub fn verbosity(mut self, verbosity: u32) -> Self {
        self.ctx.verbosity = Some(verbosity);
        self
    }

    pub fn max_records(mut self, max: usize) -> Self {
        self.ctx.max_records = max;
        self
    }

    pub fn table(mut self, table: TableConfig) -> Self {
        self.ctx.table = table;
        self
    }

    pub fn build(self) -> RequestContext {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = RequestContext::default();
        assert_eq!(ctx.max_records, DEFAULT_MAX_RECORDS);
        assert!(ctx.verbosity.is_none());
    }

    #[test]
    fn test_cone_needs_only_table() {
        let ctx = RequestContext::builder().table_name("messier").build();
        assert!(ctx.validate_for(Protocol::Cone).is_ok());
        assert!(matches!(
            ctx.validate_for(Protocol::Image),
            Err(DalError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_blank_values_are_missing() {
        let ctx = RequestContext::builder()
            .table_name("images")
            .authority_id("ivo://example.org")
            .base_url(" ")
            .service_name("sia")
            .build();
        match ctx.validate_for(Protocol::Image) {
            Err(DalError::MissingParameter(what)) => assert_eq!(what, "base URL"),
            other => panic!("Expected missing base URL, got {:?}", other),
        }
    }
}
