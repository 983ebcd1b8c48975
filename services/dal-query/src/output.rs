//! JSON documents written to stdout.

use serde::Serialize;

use dal_common::DalError;
use dal_protocol::{FieldDirectory, OutputRecord, QueryResponse, QueryStats};

/// One informational name/value pair of a response.
#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub name: String,
    pub value: String,
}

/// A successful query response.
#[derive(Debug, Serialize)]
pub struct ResponseDocument<'a> {
    /// `OK`, or `OVERFLOW` when the record cap truncated the result.
    pub status: &'static str,
    pub protocol: &'static str,
    pub infos: Vec<Info>,
    pub fields: &'a FieldDirectory,
    pub records: &'a [OutputRecord],
    pub stats: QueryStats,
}

impl<'a> ResponseDocument<'a> {
    pub fn new(response: &'a QueryResponse) -> Self {
        Self {
            status: response.query_status(),
            protocol: response.protocol.name(),
            infos: response
                .infos()
                .into_iter()
                .map(|(name, value)| Info { name, value })
                .collect(),
            fields: &response.directory,
            records: &response.records,
            stats: response.stats,
        }
    }
}

/// A failed request.
#[derive(Debug, Serialize)]
pub struct ErrorDocument {
    pub status: &'static str,
    pub http_status: u16,
    pub message: String,
}

impl From<&DalError> for ErrorDocument {
    fn from(err: &DalError) -> Self {
        Self {
            status: err.query_status(),
            http_status: err.http_status_code(),
            message: err.to_string(),
        }
    }
}

/// Serialize a document, optionally indented.
pub fn render<T: Serialize>(document: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_protocol::{ProductKind, Protocol, TableConfig};
    use serde_json::Value;

    fn response(overflow: bool) -> QueryResponse {
        let mut record = OutputRecord::new("image/fits", ProductKind::Archival);
        record.set("obs_title", "M31");
        QueryResponse {
            protocol: Protocol::Image,
            directory: FieldDirectory::build(Protocol::Image, &TableConfig::default(), Some(0)),
            records: vec![record],
            overflow,
            query: "SELECT * FROM images".to_string(),
            stats: QueryStats::default(),
        }
    }

    #[test]
    fn test_response_document() {
        let response = response(true);
        let json = render(&ResponseDocument::new(&response), false).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "OVERFLOW");
        assert_eq!(value["protocol"], "SIAP");
        assert_eq!(value["infos"][1]["name"], "QUERY");
        assert_eq!(value["infos"][1]["value"], "SELECT * FROM images");
        assert_eq!(value["records"][0]["values"]["obs_title"], "M31");
        assert_eq!(value["records"][0]["product"], "archival");
        assert!(value["fields"]["fields"].as_array().unwrap().len() > 1);
    }

    #[test]
    fn test_error_document() {
        let err = DalError::UnsupportedFrame("FK5".to_string());
        let doc = ErrorDocument::from(&err);
        assert_eq!(doc.status, "ERROR");
        assert_eq!(doc.http_status, 400);
        assert!(doc.message.contains("FK5"));

        let pretty = render(&doc, true).unwrap();
        assert!(pretty.contains('\n'));
    }
}
