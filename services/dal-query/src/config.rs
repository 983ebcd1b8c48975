//! Service configuration loading and types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use dal_protocol::{ProcessCutoutTask, RequestContext, TableConfig, DEFAULT_MAX_RECORDS};

/// Service configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Protocol served when none is given on the command line.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Publisher authority, e.g. `ivo://dal.example.org`.
    pub authority_id: Option<String>,

    /// Base URL of the service endpoints.
    pub base_url: Option<String>,

    /// Name of the service below the base URL.
    pub service_name: Option<String>,

    /// Catalog table queried.
    pub table_name: String,

    #[serde(default)]
    pub run_id: Option<String>,

    /// Verbosity used when a request has no VERB.
    #[serde(default)]
    pub verbosity: Option<u32>,

    /// Hard cap on output records.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cutout settings. Virtual records are only produced when present.
    #[serde(default)]
    pub cutout: Option<CutoutConfig>,

    /// Column mapping, omitted fields and custom fields of the table.
    #[serde(default)]
    pub table: TableConfig,
}

/// Catalog database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; `DATABASE_URL` takes precedence.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// External cutout program settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoutConfig {
    /// Program computing virtual dataset metadata.
    pub program: PathBuf,

    /// Directory the program writes dataset definitions into.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Column holding the archival file of each dataset.
    pub location_column: String,

    #[serde(default = "default_id_column")]
    pub id_column: String,
}

impl CutoutConfig {
    pub fn task(&self) -> ProcessCutoutTask {
        let task = ProcessCutoutTask::new(&self.program);
        match &self.staging_dir {
            Some(dir) => task.with_staging_dir(dir),
            None => task,
        }
    }
}

fn default_protocol() -> String {
    "image".to_string()
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_max_connections() -> u32 {
    catalog::DEFAULT_MAX_CONNECTIONS
}

fn default_id_column() -> String {
    "id".to_string()
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        tracing::info!(
            table = %config.table_name,
            protocol = %config.protocol,
            "Loaded service configuration from {:?}",
            path
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Context shared by every request of this service.
    pub fn request_context(&self) -> RequestContext {
        let mut builder = RequestContext::builder()
            .table_name(self.table_name.as_str())
            .max_records(self.max_records)
            .table(self.table.clone());
        if let Some(authority) = &self.authority_id {
            builder = builder.authority_id(authority.as_str());
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.as_str());
        }
        if let Some(name) = &self.service_name {
            builder = builder.service_name(name.as_str());
        }
        if let Some(run_id) = &self.run_id {
            builder = builder.run_id(run_id.as_str());
        }
        if let Some(verbosity) = self.verbosity {
            builder = builder.verbosity(verbosity);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_protocol::TableConfiguration;

    const SIA_YAML: &str = r#"
protocol: sia
authority_id: ivo://dal.example.org
base_url: http://dal.example.org/services
service_name: sia
table_name: images
max_records: 500
verbosity: 1
database:
  max_connections: 2
cutout:
  program: /usr/local/bin/vocutout
  staging_dir: /var/tmp/cutouts
  location_column: archive_path
table:
  columns:
    s_ra: ra2000
    s_dec: dec2000
  omit: [proposal_id]
  custom_fields:
    - id: seeing
      datatype: double
      unit: arcsec
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ServiceConfig::from_yaml_str(SIA_YAML).unwrap();
        assert_eq!(config.protocol, "sia");
        assert_eq!(config.max_records, 500);
        assert_eq!(config.database.max_connections, 2);
        assert!(config.database.url.is_none());

        let cutout = config.cutout.as_ref().unwrap();
        assert_eq!(cutout.id_column, "id");
        let task = cutout.task();
        assert_eq!(task.program(), Path::new("/usr/local/bin/vocutout"));

        assert_eq!(config.table.column("s_ra"), "ra2000");
        assert!(config.table.omits("proposal_id"));
        assert_eq!(config.table.custom_fields()[0].datatype, "double");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = ServiceConfig::from_yaml_str("table_name: messier\n").unwrap();
        assert_eq!(config.protocol, "image");
        assert_eq!(config.max_records, DEFAULT_MAX_RECORDS);
        assert!(config.cutout.is_none());

        let ctx = config.request_context();
        assert_eq!(ctx.table_name.as_deref(), Some("messier"));
        assert!(ctx.authority_id.is_none());
        assert!(ctx.verbosity.is_none());
    }

    #[test]
    fn test_request_context() {
        let config = ServiceConfig::from_yaml_str(SIA_YAML).unwrap();
        let ctx = config.request_context();
        assert_eq!(ctx.authority_id.as_deref(), Some("ivo://dal.example.org"));
        assert_eq!(ctx.service_name.as_deref(), Some("sia"));
        assert_eq!(ctx.max_records, 500);
        assert_eq!(ctx.verbosity, Some(1));
        assert_eq!(ctx.table.column("s_dec"), "dec2000");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sia.yaml");
        std::fs::write(&path, SIA_YAML).unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.table_name, "images");

        let missing = ServiceConfig::load(&dir.path().join("none.yaml")).unwrap_err();
        assert!(format!("{:#}", missing).contains("Failed to read config"));
    }

    #[test]
    fn test_missing_table_name_rejected() {
        let path_err = ServiceConfig::from_yaml_str("protocol: cone\n").unwrap_err();
        assert!(path_err.to_string().contains("table_name"), "{}", path_err);
    }
}
