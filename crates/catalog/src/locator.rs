//! Resolve dataset identifiers to archival files.

use tracing::debug;

use dal_common::DalResult;
use dal_protocol::constraints::dataset_key;
use dal_protocol::DatasetLocator;

use crate::executor::PgCatalog;

/// Looks up the file of a dataset in a location column of the catalog table.
pub struct CatalogLocator<'a> {
    catalog: &'a PgCatalog,
    query: String,
}

impl<'a> CatalogLocator<'a> {
    pub fn new(catalog: &'a PgCatalog, table: &str, id_column: &str, location_column: &str) -> Self {
        Self {
            catalog,
            query: location_query(table, id_column, location_column),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl DatasetLocator for CatalogLocator<'_> {
    fn locate(&self, publisher_did: &str) -> DalResult<Option<String>> {
        let key = dataset_key(publisher_did);
        let location = self.catalog.fetch_text(&self.query, key)?;
        debug!(key = key, location = ?location, "Located dataset");
        Ok(location.map(|l| strip_file_url(&l).to_string()))
    }
}

fn location_query(table: &str, id_column: &str, location_column: &str) -> String {
    format!(
        "SELECT {}::text FROM {} WHERE {}::text = $1 LIMIT 1",
        location_column, table, id_column
    )
}

/// Reduce a `file://` URL to its path; other locations are returned as is.
pub fn strip_file_url(location: &str) -> &str {
    let location = location.trim();
    match location.strip_prefix("file://") {
        Some(path) if path.starts_with('/') => path,
        // file://host/path
        Some(rest) => rest.find('/').map(|i| &rest[i..]).unwrap_or(rest),
        None => location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_query() {
        assert_eq!(
            location_query("images", "id", "archive_path"),
            "SELECT archive_path::text FROM images WHERE id::text = $1 LIMIT 1"
        );
    }

    #[test]
    fn test_strip_file_url() {
        assert_eq!(strip_file_url("file:///data/m31.fits"), "/data/m31.fits");
        assert_eq!(strip_file_url("file://localhost/data/m31.fits"), "/data/m31.fits");
        assert_eq!(strip_file_url(" /data/m31.fits "), "/data/m31.fits");
        assert_eq!(strip_file_url("s3://bucket/m31.fits"), "s3://bucket/m31.fits");
    }
}
