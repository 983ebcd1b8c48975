//! Catalog rows in, output records out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row returned by the catalog, keyed by physical column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    values: BTreeMap<String, Value>,
}

impl CatalogRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Raw value of a column. Falls back to a case-insensitive match since
    /// catalogs may fold column names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column).or_else(|| {
            self.values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
    }

    /// Text form of a column; NULL and absent columns give `None`.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Numeric value of a column, parsing text if needed.
    pub fn f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for CatalogRow {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

/// Whether a record describes a stored dataset or one computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Archival,
    Virtual,
}

impl ProductKind {
    /// Value of the `obs_creation_type` field.
    pub fn creation_type(&self) -> &'static str {
        match self {
            ProductKind::Archival => "archival",
            ProductKind::Virtual => "cutout",
        }
    }
}

/// One record of a query response, keyed by field id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub values: BTreeMap<String, Value>,
    /// Shared by every variant derived from the same catalog row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assoc_id: Option<String>,
    /// MIME type of the described dataset.
    pub format: String,
    pub product: ProductKind,
}

impl OutputRecord {
    pub fn new(format: impl Into<String>, product: ProductKind) -> Self {
        Self {
            values: BTreeMap::new(),
            assoc_id: None,
            format: format.into(),
            product,
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Text form of a field; NULL and absent fields give `None`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = CatalogRow::new()
            .with("s_ra", 10.5)
            .with("im_naxis1", "2048")
            .with("title", Value::Null);
        assert_eq!(row.f64("s_ra"), Some(10.5));
        assert_eq!(row.f64("im_naxis1"), Some(2048.0));
        assert_eq!(row.text("s_ra").as_deref(), Some("10.5"));
        assert_eq!(row.text("title"), None);
        assert!(row.get("title").is_some());
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_row_case_fallback() {
        let row = CatalogRow::new().with("S_RA", 1.0);
        assert_eq!(row.f64("s_ra"), Some(1.0));
    }

    #[test]
    fn test_row_from_json() {
        let map: Map<String, Value> =
            serde_json::from_str(r#"{"id": 7, "access_format": "image/fits"}"#).unwrap();
        let row = CatalogRow::from(map);
        assert_eq!(row.text("id").as_deref(), Some("7"));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_record_fields() {
        let mut record = OutputRecord::new("image/fits", ProductKind::Archival);
        record.set("obs_title", "M31");
        assert_eq!(record.text("obs_title"), Some("M31"));
        assert_eq!(record.product.creation_type(), "archival");
    }
}
