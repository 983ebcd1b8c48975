//! Output field declarations and the per-response field directory.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::protocol::Protocol;
use crate::table::TableConfiguration;

/// Hint letter of fields shown at the lowest verbosity.
pub const HINT_MAIN: char = 'm';
/// Hint letter of fields added at verbosity 1.
pub const HINT_QUERY: char = 'q';

/// Declaration of one output field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub utype: String,
    pub datatype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arraysize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ucd: Option<String>,
    #[serde(skip)]
    pub hint: String,
}

impl FieldDescriptor {
    /// Whether the field passes a verbosity hint mask.
    pub fn matches_mask(&self, mask: Option<&str>) -> bool {
        match mask {
            None => true,
            Some(mask) => self.hint.chars().any(|c| mask.contains(c)),
        }
    }

    /// Convert a text value into a JSON value of this field's datatype.
    ///
    /// Text that does not parse as the declared number type is kept as a string.
    pub fn coerce(&self, text: &str) -> Value {
        let text = text.trim();
        match self.datatype.as_str() {
            "short" | "int" | "long" => text
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(text)),
            "float" | "double" => text
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(text)),
            "boolean" => match text.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Value::Bool(true),
                "false" | "f" | "0" => Value::Bool(false),
                _ => Value::from(text),
            },
            _ => Value::from(text),
        }
    }
}

struct FieldDef {
    id: &'static str,
    utype: &'static str,
    datatype: &'static str,
    unit: Option<&'static str>,
    hint: &'static str,
}

const fn def(
    id: &'static str,
    utype: &'static str,
    datatype: &'static str,
    unit: Option<&'static str>,
    hint: &'static str,
) -> FieldDef {
    FieldDef {
        id,
        utype,
        datatype,
        unit,
        hint,
    }
}

const DEG: Option<&str> = Some("deg");
const METRE: Option<&str> = Some("m");
const DAY: Option<&str> = Some("d");
const SECOND: Option<&str> = Some("s");

const IMAGE_FIELDS: &[FieldDef] = &[
    def("assoc_id", "Association.ID", "char", None, "m"),
    def("access_url", "Access.Reference", "char", None, "m"),
    def("access_format", "Access.Format", "char", None, "m"),
    def("access_estsize", "Access.Size", "long", Some("kbyte"), "q"),
    def("dataproduct_type", "Dataset.Type", "char", None, "m"),
    def("dataproduct_subtype", "Dataset.SubType", "char", None, ""),
    def("calib_level", "Dataset.CalibLevel", "int", None, "q"),
    def("dataset_length", "Dataset.Length", "long", None, ""),
    def("im_nsubarrays", "Image.NSubarrays", "int", None, ""),
    def("im_naxes", "Image.Naxes", "int", None, "m"),
    def("im_naxis", "Image.Naxis", "char", None, "m"),
    def("im_pixtype", "Image.PixType", "char", None, "q"),
    def("im_wcsaxes", "Image.WCSAxes", "char", None, "q"),
    def("im_scale", "Image.Scale", "double", Some("arcsec"), "q"),
    def("obs_title", "DataID.Title", "char", None, "m"),
    def("obs_id", "DataID.ObservationID", "char", None, ""),
    def("obs_creator_name", "DataID.Creator", "char", None, ""),
    def("obs_collection", "DataID.Collection", "char", None, "q"),
    def("obs_creator_did", "DataID.CreatorDID", "char", None, ""),
    def("obs_dataset_did", "DataID.DatasetDID", "char", None, ""),
    def("obs_creation_type", "DataID.CreationType", "char", None, "q"),
    def("obs_creation_date", "DataID.Date", "char", None, ""),
    def("facility_name", "Provenance.Facility", "char", None, "q"),
    def("instrument_name", "Provenance.Instrument", "char", None, "q"),
    def("obs_bandpass", "Provenance.Bandpass", "char", None, ""),
    def("obs_datasource", "Provenance.DataSource", "char", None, ""),
    def("proposal_id", "Provenance.Proposal", "char", None, ""),
    def("obs_publisher_did", "Curation.PublisherDID", "char", None, "m"),
    def("obs_release_date", "Curation.ReleaseDate", "char", None, ""),
    def("preview", "Curation.Preview", "char", None, "q"),
    def("target_name", "Target.Name", "char", None, "q"),
    def("target_class", "Target.Class", "char", None, ""),
    def("s_ra", "Char.SpatialAxis.Coverage.Location.C1", "double", DEG, "m"),
    def("s_dec", "Char.SpatialAxis.Coverage.Location.C2", "double", DEG, "m"),
    def("s_fov", "Char.SpatialAxis.Coverage.Bounds.Extent", "double", DEG, "m"),
    def("s_region", "Char.SpatialAxis.Coverage.Support.Area", "char", None, "q"),
    def("s_calib_status", "Char.SpatialAxis.CalibrationStatus", "char", None, ""),
    def("s_resolution", "Char.SpatialAxis.Resolution", "double", Some("arcsec"), "q"),
    def("em_min", "Char.SpectralAxis.Coverage.Bounds.Start", "double", METRE, "m"),
    def("em_max", "Char.SpectralAxis.Coverage.Bounds.Stop", "double", METRE, "m"),
    def("em_resolution", "Char.SpectralAxis.Resolution", "double", METRE, "q"),
    def("em_res_power", "Char.SpectralAxis.ResolvingPower", "double", None, ""),
    def("t_min", "Char.TimeAxis.Coverage.Bounds.Start", "double", DAY, "m"),
    def("t_max", "Char.TimeAxis.Coverage.Bounds.Stop", "double", DAY, "m"),
    def("t_exptime", "Char.TimeAxis.Coverage.Support.Extent", "double", SECOND, "q"),
    def("t_resolution", "Char.TimeAxis.Resolution", "double", SECOND, ""),
    def("o_ucd", "Char.FluxAxis.Ucd", "char", None, ""),
    def("o_unit", "Char.FluxAxis.Unit", "char", None, ""),
    def("o_calib_status", "Char.FluxAxis.CalibrationStatus", "char", None, ""),
    def("pol_states", "Char.PolarizationAxis.StateList", "char", None, "q"),
];

const SPECTRUM_FIELDS: &[FieldDef] = &[
    def("assoc_id", "Association.ID", "char", None, "m"),
    def("access_url", "Access.Reference", "char", None, "m"),
    def("access_format", "Access.Format", "char", None, "m"),
    def("access_estsize", "Access.Size", "long", Some("kbyte"), "q"),
    def("dataproduct_type", "Dataset.Type", "char", None, "m"),
    def("dataproduct_subtype", "Dataset.SubType", "char", None, ""),
    def("calib_level", "Dataset.CalibLevel", "int", None, "q"),
    def("dataset_length", "Dataset.Length", "long", None, "q"),
    def("obs_title", "DataID.Title", "char", None, "m"),
    def("obs_id", "DataID.ObservationID", "char", None, ""),
    def("obs_creator_name", "DataID.Creator", "char", None, ""),
    def("obs_collection", "DataID.Collection", "char", None, "q"),
    def("obs_creator_did", "DataID.CreatorDID", "char", None, ""),
    def("obs_dataset_did", "DataID.DatasetDID", "char", None, ""),
    def("obs_creation_type", "DataID.CreationType", "char", None, "q"),
    def("obs_creation_date", "DataID.Date", "char", None, ""),
    def("facility_name", "Provenance.Facility", "char", None, "q"),
    def("instrument_name", "Provenance.Instrument", "char", None, "q"),
    def("obs_bandpass", "Provenance.Bandpass", "char", None, ""),
    def("obs_datasource", "Provenance.DataSource", "char", None, ""),
    def("proposal_id", "Provenance.Proposal", "char", None, ""),
    def("obs_publisher_did", "Curation.PublisherDID", "char", None, "m"),
    def("obs_release_date", "Curation.ReleaseDate", "char", None, ""),
    def("preview", "Curation.Preview", "char", None, "q"),
    def("target_name", "Target.Name", "char", None, "q"),
    def("target_class", "Target.Class", "char", None, ""),
    def("target_redshift", "Target.Redshift", "double", None, ""),
    def("s_ra", "Char.SpatialAxis.Coverage.Location.C1", "double", DEG, "m"),
    def("s_dec", "Char.SpatialAxis.Coverage.Location.C2", "double", DEG, "m"),
    def("s_fov", "Char.SpatialAxis.Coverage.Bounds.Extent", "double", DEG, "m"),
    def("s_region", "Char.SpatialAxis.Coverage.Support.Area", "char", None, "q"),
    def("s_resolution", "Char.SpatialAxis.Resolution", "double", Some("arcsec"), "q"),
    def("em_min", "Char.SpectralAxis.Coverage.Bounds.Start", "double", METRE, "m"),
    def("em_max", "Char.SpectralAxis.Coverage.Bounds.Stop", "double", METRE, "m"),
    def("em_resolution", "Char.SpectralAxis.Resolution", "double", METRE, "q"),
    def("em_res_power", "Char.SpectralAxis.ResolvingPower", "double", None, ""),
    def("em_calib_status", "Char.SpectralAxis.CalibrationStatus", "char", None, ""),
    def("t_min", "Char.TimeAxis.Coverage.Bounds.Start", "double", DAY, "m"),
    def("t_max", "Char.TimeAxis.Coverage.Bounds.Stop", "double", DAY, "m"),
    def("t_exptime", "Char.TimeAxis.Coverage.Support.Extent", "double", SECOND, "q"),
    def("t_resolution", "Char.TimeAxis.Resolution", "double", SECOND, ""),
    def("o_ucd", "Char.FluxAxis.Ucd", "char", None, ""),
    def("o_unit", "Char.FluxAxis.Unit", "char", None, ""),
    def("o_calib_status", "Char.FluxAxis.CalibrationStatus", "char", None, ""),
    def("pol_states", "Char.PolarizationAxis.StateList", "char", None, ""),
];

const CONE_FIELDS: &[FieldDef] = &[
    def("id", "Source.ID", "char", None, "m"),
    def("ra", "Source.Position.C1", "double", DEG, "m"),
    def("dec", "Source.Position.C2", "double", DEG, "m"),
];

fn ucd_for(id: &str) -> Option<&'static str> {
    match id {
        "s_ra" | "ra" => Some("pos.eq.ra;meta.main"),
        "s_dec" | "dec" => Some("pos.eq.dec;meta.main"),
        "id" => Some("meta.id;meta.main"),
        "access_url" => Some("meta.ref.url"),
        "obs_publisher_did" => Some("meta.ref.ivoid"),
        _ => None,
    }
}

/// Standard fields of a protocol, in response order.
pub fn standard_fields(protocol: Protocol) -> Vec<FieldDescriptor> {
    let defs = match protocol {
        Protocol::Image => IMAGE_FIELDS,
        Protocol::Spectrum => SPECTRUM_FIELDS,
        Protocol::Cone => CONE_FIELDS,
    };
    let prefix = protocol.utype_prefix();
    defs.iter()
        .map(|d| FieldDescriptor {
            id: d.id.to_string(),
            utype: format!("{}:{}", prefix, d.utype),
            datatype: d.datatype.to_string(),
            arraysize: (d.datatype == "char").then(|| "*".to_string()),
            unit: d.unit.map(str::to_string),
            ucd: ucd_for(d.id).map(str::to_string),
            hint: d.hint.to_string(),
        })
        .collect()
}

/// The declared fields of one response, indexed by id and by utype.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldDirectory {
    fields: Vec<FieldDescriptor>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
    #[serde(skip)]
    by_utype: HashMap<String, usize>,
}

impl FieldDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the directory for a request: standard fields filtered by the
    /// table's omissions and verbosity mask, then the table's custom fields.
    pub fn build(
        protocol: Protocol,
        table: &dyn TableConfiguration,
        verbosity: Option<u32>,
    ) -> Self {
        let mask = table.verbosity_mask(verbosity);
        let mut directory = Self::new();

        for field in standard_fields(protocol) {
            if table.omits(&field.id) || !field.matches_mask(mask.as_deref()) {
                continue;
            }
            directory.insert(field);
        }

        for custom in table.custom_fields() {
            directory.insert(FieldDescriptor {
                id: custom.id.clone(),
                utype: custom.utype.clone().unwrap_or_default(),
                datatype: custom.datatype.clone(),
                arraysize: custom.arraysize.clone(),
                unit: custom.unit.clone(),
                ucd: custom.ucd.clone(),
                hint: HINT_MAIN.to_string(),
            });
        }

        directory
    }

    /// Add a field. Returns false, leaving the directory unchanged, if the
    /// id is already declared.
    pub fn insert(&mut self, field: FieldDescriptor) -> bool {
        if self.by_id.contains_key(&field.id) {
            return false;
        }
        let index = self.fields.len();
        self.by_id.insert(field.id.clone(), index);
        if !field.utype.is_empty() {
            self.by_utype.entry(field.utype.clone()).or_insert(index);
        }
        self.fields.push(field);
        true
    }

    pub fn get(&self, id: &str) -> Option<&FieldDescriptor> {
        self.by_id.get(id).map(|&i| &self.fields[i])
    }

    pub fn by_utype(&self, utype: &str) -> Option<&FieldDescriptor> {
        self.by_utype.get(utype).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
