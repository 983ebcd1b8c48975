//! Virtual (cutout) datasets.
//!
//! A virtual record starts as a copy of its archival record. The archival
//! file is located, an external task computes the metadata of the cutout,
//! and the record's access URL and fields are rewritten to describe it.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use dal_common::DalResult;

use crate::constraints::CompiledQuery;
use crate::fields::FieldDirectory;
use crate::records::{OutputRecord, ProductKind};
use crate::synthesis::{decode, encode};

/// Keywords returned by a cutout task, keyed by field id.
pub type KeywordMap = BTreeMap<String, String>;

/// Keyword naming the metadata file of a computed cutout.
pub const MDFILE: &str = "MDFILE";

/// Finds the archival file of a dataset.
pub trait DatasetLocator {
    /// Physical location of a dataset. `Ok(None)` means the dataset has no
    /// archival file; an error aborts the request.
    fn locate(&self, publisher_did: &str) -> DalResult<Option<String>>;
}

/// Computes the metadata of a cutout.
pub trait CutoutTask {
    /// Run the task against an archival file. `Ok(None)` means the cutout
    /// does not exist, for example when the region misses the image.
    fn compute(&self, path: &str, request: &CutoutRequest) -> DalResult<Option<KeywordMap>>;
}

/// Region and axes a cutout is computed for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CutoutRequest {
    pub publisher_did: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// Full width and height of the cutout, in degrees.
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub wave_low: Option<f64>,
    pub wave_high: Option<f64>,
    /// Time bounds in MJD.
    pub time_low: Option<f64>,
    pub time_high: Option<f64>,
    pub pol_states: Option<String>,
}

impl CutoutRequest {
    pub fn from_query(query: &CompiledQuery) -> Self {
        let mut request = Self::default();
        if let Some(region) = &query.region {
            request.ra = Some(region.center_lon);
            request.dec = Some(region.center_lat);
            request.width = Some(2.0 * region.half_lon);
            request.height = Some(2.0 * region.half_lat);
        }
        if let Some(band) = &query.band {
            request.wave_low = band.low;
            request.wave_high = band.high;
        }
        if let Some(time) = &query.time {
            request.time_low = time.low;
            request.time_high = time.high;
        }
        request.pol_states = query.pol.clone();
        request
    }

    /// A copy of this request for one dataset.
    pub fn for_dataset(&self, publisher_did: &str) -> Self {
        Self {
            publisher_did: Some(publisher_did.to_string()),
            ..self.clone()
        }
    }
}

/// Parse `KEY = value` lines. Blank lines, `#` comments and `[section]`
/// headers are skipped; a repeated key keeps its last value.
pub fn parse_keyword_text(text: &str) -> KeywordMap {
    let mut keywords = KeywordMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                keywords.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    keywords
}

/// Replace the dataset part of the PubDID in an access URL.
///
/// The text after the last `#` of the decoded identifier becomes
/// `replacement`. Query arguments after the PubDID, such as `RunID`,
/// are kept. Returns `None` if the URL carries no PubDID.
pub fn replace_dataset_reference(url: &str, replacement: &str) -> Option<String> {
    const KEY: &str = "PubDID=";
    let start = url.find(KEY)? + KEY.len();
    let (head, rest) = url.split_at(start);
    let (encoded, tail) = match rest.find('&') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };

    let did = decode(encoded);
    let keep = did.rfind('#').map(|i| i + 1).unwrap_or(0);
    let replaced = format!("{}{}", &did[..keep], replacement);
    Some(format!("{}{}{}", head, encode(&replaced), tail))
}

/// What happened to a virtual record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The record must be dropped; the reason is for logging.
    Discarded(String),
}

/// Rewrites virtual records using a locator and a cutout task.
pub struct VirtualImageEditor<'a> {
    locator: &'a dyn DatasetLocator,
    task: &'a dyn CutoutTask,
    request: CutoutRequest,
}

impl<'a> VirtualImageEditor<'a> {
    pub fn new(
        locator: &'a dyn DatasetLocator,
        task: &'a dyn CutoutTask,
        request: CutoutRequest,
    ) -> Self {
        Self {
            locator,
            task,
            request,
        }
    }

    /// Rewrite a virtual record in place.
    ///
    /// Task failures and missing results discard the record; a locator
    /// error is returned and aborts the request.
    pub fn edit(
        &self,
        record: &mut OutputRecord,
        publisher_did: &str,
        directory: &FieldDirectory,
    ) -> DalResult<EditOutcome> {
        let Some(path) = self.locator.locate(publisher_did)? else {
            return Ok(EditOutcome::Discarded(format!(
                "no archival file for {}",
                publisher_did
            )));
        };

        let request = self.request.for_dataset(publisher_did);
        let keywords = match self.task.compute(&path, &request) {
            Ok(Some(keywords)) => keywords,
            Ok(None) => {
                return Ok(EditOutcome::Discarded(format!(
                    "no cutout of {} for this region",
                    publisher_did
                )))
            }
            Err(err) => {
                warn!(publisher_did = %publisher_did, error = %err, "Cutout task failed");
                return Ok(EditOutcome::Discarded(err.to_string()));
            }
        };

        let Some(mdfile) = keywords.get(MDFILE) else {
            return Ok(EditOutcome::Discarded(format!(
                "cutout task returned no {} for {}",
                MDFILE, publisher_did
            )));
        };

        if let Some(url) = record.text("access_url").map(str::to_string) {
            match replace_dataset_reference(&url, mdfile) {
                Some(rewritten) => record.set("access_url", rewritten),
                None => {
                    return Ok(EditOutcome::Discarded(format!(
                        "access URL of {} has no PubDID",
                        publisher_did
                    )))
                }
            }
        }

        record.product = ProductKind::Virtual;
        if directory.contains("obs_creation_type") {
            record.set("obs_creation_type", ProductKind::Virtual.creation_type());
        }

        // Keywords name a field by id or by utype.
        for (key, value) in &keywords {
            if let Some(field) = directory.get(key).or_else(|| directory.by_utype(key)) {
                record.set(field.id.clone(), field.coerce(value));
            }
        }

        debug!(publisher_did = %publisher_did, mdfile = %mdfile, "Virtual record rewritten");
        Ok(EditOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyword_text() {
        let text = "\
# cutout metadata
[image]
MDFILE = /tmp/cut-1.md
im_naxis = 200 200
obs_title=Cutout of M31
bogus line
MDFILE = /tmp/cut-2.md
";
        let keywords = parse_keyword_text(text);
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords["MDFILE"], "/tmp/cut-2.md");
        assert_eq!(keywords["im_naxis"], "200 200");
        assert_eq!(keywords["obs_title"], "Cutout of M31");
    }

    #[test]
    fn test_replace_dataset_reference() {
        let url = "http://h/s/sync?REQUEST=accessData&FORMAT=image/fits\
                   &PubDID=ivo%3A%2F%2Fauth%23images%3A42&RunID=r1";
        let out = replace_dataset_reference(url, "cut-42.md").unwrap();
        assert_eq!(
            out,
            "http://h/s/sync?REQUEST=accessData&FORMAT=image/fits\
             &PubDID=ivo%3A%2F%2Fauth%23cut-42.md&RunID=r1"
        );
        assert!(replace_dataset_reference("http://h/s?x=1", "a").is_none());
    }

    #[test]
    fn test_replace_without_run_id() {
        let out = replace_dataset_reference("u?PubDID=plain", "new").unwrap();
        assert_eq!(out, "u?PubDID=new");
    }
}
