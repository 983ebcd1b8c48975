//! Table configuration: how canonical field names map onto catalog columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from canonical field names to the physical columns of a table,
/// plus the policy for which fields appear in a response.
pub trait TableConfiguration {
    /// Physical column for a canonical name, if the table renames it.
    fn resolve(&self, canonical: &str) -> Option<&str>;

    /// Hint mask for a verbosity level. `None` includes every field.
    fn verbosity_mask(&self, verbosity: Option<u32>) -> Option<String> {
        default_verbosity_mask(verbosity)
    }

    /// Whether a standard field is left out of the response.
    fn omits(&self, _field_id: &str) -> bool {
        false
    }

    /// Additional fields published by this table.
    fn custom_fields(&self) -> &[CustomField] {
        &[]
    }

    /// Physical column for a canonical name, falling back to the name itself.
    fn column<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.resolve(canonical).unwrap_or(canonical)
    }
}

/// Hint masks used when a table does not define its own:
/// level 0 shows main fields, level 1 adds query fields, higher shows all.
pub fn default_verbosity_mask(verbosity: Option<u32>) -> Option<String> {
    match verbosity {
        Some(0) => Some("m".to_string()),
        Some(1) => Some("mq".to_string()),
        _ => None,
    }
}

/// A table-specific output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    #[serde(default = "default_datatype")]
    pub datatype: String,
    #[serde(default)]
    pub arraysize: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub ucd: Option<String>,
    #[serde(default)]
    pub utype: Option<String>,
    /// Column holding the value; defaults to the field id.
    #[serde(default)]
    pub column: Option<String>,
}

fn default_datatype() -> String {
    "char".to_string()
}

/// Serde-loadable table configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Canonical name to physical column.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    /// Standard fields to leave out of responses.
    #[serde(default)]
    pub omit: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    /// Verbosity level to hint mask, overriding the defaults.
    #[serde(default)]
    pub verbosity: BTreeMap<u32, String>,
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a canonical name to a physical column.
    pub fn with_column(mut self, canonical: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(canonical.into(), column.into());
        self
    }

    pub fn with_custom_field(mut self, field: CustomField) -> Self {
        self.custom_fields.push(field);
        self
    }
}

impl TableConfiguration for TableConfig {
    fn resolve(&self, canonical: &str) -> Option<&str> {
        if let Some(column) = self.columns.get(canonical) {
            return Some(column.as_str());
        }
        self.custom_fields
            .iter()
            .find(|f| f.id == canonical)
            .and_then(|f| f.column.as_deref())
    }

    fn verbosity_mask(&self, verbosity: Option<u32>) -> Option<String> {
        match verbosity.and_then(|v| self.verbosity.get(&v)) {
            Some(mask) => Some(mask.clone()),
            None => default_verbosity_mask(verbosity),
        }
    }

    fn omits(&self, field_id: &str) -> bool {
        self.omit.iter().any(|f| f == field_id)
    }

    fn custom_fields(&self) -> &[CustomField] {
        &self.custom_fields
    }
}
