//! Build output records from catalog rows.
//!
//! Most fields are copied from their mapped column. Dataset identifiers,
//! access and preview URLs, the creation type and the image axis
//! descriptors are computed instead.

use serde_json::Value;

use dal_common::{DalError, DalResult};

use crate::context::RequestContext;
use crate::fields::FieldDirectory;
use crate::protocol::Protocol;
use crate::records::{CatalogRow, OutputRecord};
use crate::table::TableConfiguration;
use crate::variants::FormatVariant;

/// Image axes are stored per axis in columns suffixed 1 to this number.
const MAX_IMAGE_AXES: usize = 4;

/// Computed image axis descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisDescriptors {
    /// Number of axes longer than one pixel.
    pub naxes: i64,
    /// Space-separated axis lengths.
    pub naxis: String,
    /// Space-separated WCS axis types.
    pub wcsaxes: String,
}

/// A synthesized record plus the dataset identifier it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub record: OutputRecord,
    pub publisher_did: Option<String>,
}

/// Fills output records for one request.
pub struct MetadataSynthesizer<'a> {
    protocol: Protocol,
    ctx: &'a RequestContext,
    table: &'a dyn TableConfiguration,
    directory: &'a FieldDirectory,
    run_id: Option<&'a str>,
}

impl<'a> MetadataSynthesizer<'a> {
    pub fn new(
        protocol: Protocol,
        ctx: &'a RequestContext,
        table: &'a dyn TableConfiguration,
        directory: &'a FieldDirectory,
    ) -> Self {
        Self {
            protocol,
            ctx,
            table,
            directory,
            run_id: ctx.run_id.as_deref(),
        }
    }

    /// Override the run ID appended to generated URLs.
    pub fn with_run_id(mut self, run_id: Option<&'a str>) -> Self {
        if run_id.is_some() {
            self.run_id = run_id;
        }
        self
    }

    pub fn directory(&self) -> &FieldDirectory {
        self.directory
    }

    /// `<authority>#<table>:<id>`, adding the `#` only when missing.
    pub fn publisher_did(&self, row: &CatalogRow) -> DalResult<String> {
        let mut did = self.ctx.require_authority()?.to_string();
        if !did.ends_with('#') {
            did.push('#');
        }
        let table = self.ctx.require_table()?;
        let id = row.text(self.table.column("id")).ok_or_else(|| {
            DalError::invalid_parameter("id", "catalog row has no dataset id")
        })?;
        did.push_str(table);
        did.push(':');
        did.push_str(&id);
        Ok(did)
    }

    fn sync_endpoint(&self) -> DalResult<String> {
        let mut base = self.ctx.require_base_url()?.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(format!("{}{}/sync", base, self.ctx.require_service_name()?))
    }

    fn append_run_id(&self, url: &mut String) {
        if let Some(run_id) = self.run_id {
            url.push_str("&RunID=");
            url.push_str(&encode(run_id));
        }
    }

    pub fn access_url(&self, publisher_did: &str, format: &str) -> DalResult<String> {
        let mut url = format!(
            "{}?REQUEST=accessData&FORMAT={}&PubDID={}",
            self.sync_endpoint()?,
            format,
            encode(publisher_did)
        );
        self.append_run_id(&mut url);
        Ok(url)
    }

    pub fn preview_url(&self, publisher_did: &str) -> DalResult<String> {
        let mut url = format!(
            "{}?REQUEST=accessData&Preview=true&PubDID={}",
            self.sync_endpoint()?,
            encode(publisher_did)
        );
        self.append_run_id(&mut url);
        Ok(url)
    }

    /// Collect the per-axis image columns into descriptors. Scanning stops
    /// at the first missing axis; degenerate axes of length 0 or 1 are skipped.
    pub fn axis_descriptors(&self, row: &CatalogRow) -> AxisDescriptors {
        let mut naxes = 0;
        let mut lengths = Vec::new();
        let mut wcs = Vec::new();

        for i in 1..=MAX_IMAGE_AXES {
            let naxis_col = format!("im_naxis{}", i);
            let Some(length) = row.text(self.table.column(&naxis_col)) else {
                break;
            };
            if matches!(length.trim().parse::<f64>(), Ok(n) if n == 0.0 || n == 1.0) {
                continue;
            }
            naxes += 1;
            lengths.push(length.trim().to_string());

            let wcs_col = format!("im_wcsaxes{}", i);
            if let Some(axis) = row.text(self.table.column(&wcs_col)) {
                wcs.push(axis.trim().to_string());
            }
        }

        AxisDescriptors {
            naxes,
            naxis: lengths.join(" "),
            wcsaxes: wcs.join(" "),
        }
    }

    /// Build one record of the given variant from a row.
    pub fn synthesize(&self, row: &CatalogRow, variant: &FormatVariant) -> DalResult<Synthesized> {
        let mut record = OutputRecord::new(variant.mime.clone(), variant.product);

        if !self.protocol.synthesizes_access() {
            for field in self.directory.iter() {
                record.set(field.id.clone(), self.copied(row, &field.id));
            }
            return Ok(Synthesized {
                record,
                publisher_did: None,
            });
        }

        let did = self.publisher_did(row)?;
        let axes = if self.protocol == Protocol::Image {
            Some(self.axis_descriptors(row))
        } else {
            None
        };

        for field in self.directory.iter() {
            let value = match (field.id.as_str(), &axes) {
                ("obs_publisher_did", _) => Value::from(did.as_str()),
                ("access_url", _) => Value::from(self.access_url(&did, &variant.mime)?),
                ("access_format", _) => Value::from(variant.mime.as_str()),
                ("preview", _) => Value::from(self.preview_url(&did)?),
                ("obs_creation_type", _) => Value::from(variant.product.creation_type()),
                ("assoc_id", _) => Value::Null,
                ("im_naxes", Some(axes)) => Value::from(axes.naxes),
                ("im_naxis", Some(axes)) => Value::from(axes.naxis.as_str()),
                ("im_wcsaxes", Some(axes)) => Value::from(axes.wcsaxes.as_str()),
                (id, _) => self.copied(row, id),
            };
            record.set(field.id.clone(), value);
        }

        Ok(Synthesized {
            record,
            publisher_did: Some(did),
        })
    }

    fn copied(&self, row: &CatalogRow, id: &str) -> Value {
        row.get(self.table.column(id))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Form-encode a query value: spaces become '+', reserved bytes are escaped.
pub fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Decode a form-encoded query value.
pub fn decode(value: &str) -> String {
    let joined = format!("v={}", value);
    form_urlencoded::parse(joined.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ProductKind;
    use crate::table::TableConfig;

    fn ctx(authority: &str) -> RequestContext {
        RequestContext::builder()
            .authority_id(authority)
            .base_url("http://dal.example.org/svc")
            .service_name("sia")
            .table_name("images")
            .build()
    }

    fn archival() -> FormatVariant {
        FormatVariant {
            mime: "image/fits".to_string(),
            product: ProductKind::Archival,
        }
    }

    #[test]
    fn test_publisher_did_separator() {
        let table = TableConfig::default();
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let row = CatalogRow::new().with("id", 42);

        let with_hash = ctx("ivo://example.org#");
        let synth = MetadataSynthesizer::new(Protocol::Image, &with_hash, &table, &directory);
        assert_eq!(synth.publisher_did(&row).unwrap(), "ivo://example.org#images:42");

        let without = ctx("ivo://example.org");
        let synth = MetadataSynthesizer::new(Protocol::Image, &without, &table, &directory);
        assert_eq!(synth.publisher_did(&row).unwrap(), "ivo://example.org#images:42");
    }

    #[test]
    fn test_access_and_preview_urls() {
        let table = TableConfig::default();
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let mut context = ctx("ivo://example.org");
        context.run_id = Some("run7".to_string());
        let synth = MetadataSynthesizer::new(Protocol::Image, &context, &table, &directory);

        let url = synth
            .access_url("ivo://example.org#images:42", "image/fits")
            .unwrap();
        assert_eq!(
            url,
            "http://dal.example.org/svc/sia/sync?REQUEST=accessData&FORMAT=image/fits\
             &PubDID=ivo%3A%2F%2Fexample.org%23images%3A42&RunID=run7"
        );
        let preview = synth.preview_url("a b").unwrap();
        assert!(preview.ends_with("Preview=true&PubDID=a+b&RunID=run7"));
    }

    #[test]
    fn test_run_id_is_encoded() {
        let table = TableConfig::default();
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let context = ctx("ivo://example.org");
        let synth = MetadataSynthesizer::new(Protocol::Image, &context, &table, &directory)
            .with_run_id(Some("job 7&x=1"));

        let url = synth.access_url("ivo://example.org#images:42", "image/fits").unwrap();
        assert!(url.ends_with("&RunID=job+7%26x%3D1"), "{}", url);
        assert_eq!(url.matches('&').count(), 3);
    }

    #[test]
    fn test_axis_descriptors() {
        let table = TableConfig::default();
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let context = ctx("ivo://example.org");
        let synth = MetadataSynthesizer::new(Protocol::Image, &context, &table, &directory);

        let row = CatalogRow::new()
            .with("im_naxis1", 2048)
            .with("im_naxis2", 1)
            .with("im_naxis3", 512)
            .with("im_wcsaxes1", "RA---TAN")
            .with("im_wcsaxes2", "DEC--TAN")
            .with("im_wcsaxes3", "WAVE");
        let axes = synth.axis_descriptors(&row);
        assert_eq!(axes.naxes, 2);
        assert_eq!(axes.naxis, "2048 512");
        assert_eq!(axes.wcsaxes, "RA---TAN WAVE");

        let gap = CatalogRow::new().with("im_naxis1", 100).with("im_naxis3", 100);
        assert_eq!(synth.axis_descriptors(&gap).naxes, 1);
    }

    #[test]
    fn test_synthesize_copies_and_computes() {
        let table = TableConfig::new().with_column("obs_title", "title");
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let context = ctx("ivo://example.org");
        let synth = MetadataSynthesizer::new(Protocol::Image, &context, &table, &directory);

        let row = CatalogRow::new()
            .with("id", "7")
            .with("title", "Orion")
            .with("s_ra", 83.8)
            .with("access_format", "image/fits");
        let out = synth.synthesize(&row, &archival()).unwrap();
        let record = out.record;
        assert_eq!(out.publisher_did.as_deref(), Some("ivo://example.org#images:7"));
        assert_eq!(record.text("obs_title"), Some("Orion"));
        assert_eq!(record.get("s_ra"), Some(&Value::from(83.8)));
        assert_eq!(record.text("obs_creation_type"), Some("archival"));
        assert_eq!(record.get("im_naxes"), Some(&Value::from(0)));
        assert_eq!(record.get("t_min"), Some(&Value::Null));
        assert_eq!(record.values.len(), directory.len());
    }

    #[test]
    fn test_missing_authority_fails() {
        let table = TableConfig::default();
        let directory = FieldDirectory::build(Protocol::Image, &table, None);
        let context = RequestContext::builder().table_name("images").build();
        let synth = MetadataSynthesizer::new(Protocol::Image, &context, &table, &directory);
        let row = CatalogRow::new().with("id", 1);
        assert!(synth.synthesize(&row, &archival()).is_err());
    }

    #[test]
    fn test_decode_round_trips_encode() {
        let did = "ivo://example.org#images:a b+c";
        assert_eq!(decode(&encode(did)), did);
    }
}
