//! Protocol variants and what each one supports.

use serde::{Deserialize, Serialize};
use std::fmt;

use dal_common::{DalError, DalResult};

use crate::params::{ParamKind, ParamSpec};

/// A DAL discovery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Simple Image Access.
    Image,
    /// Simple Spectral Access.
    Spectrum,
    /// Simple Cone Search.
    Cone,
}

/// A constraint axis a protocol may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Spatial,
    Spectral,
    Temporal,
    Polarization,
    SpatialResolution,
    SpectralResolution,
    ResolvingPower,
    Identifier,
    Collection,
    AstrometricCalibration,
    FluxCalibration,
    WavelengthCalibration,
    DatasetShape,
}

impl Axis {
    /// Canonical column constrained by a calibration axis.
    pub fn calibration_column(&self) -> Option<&'static str> {
        match self {
            Axis::AstrometricCalibration => Some("s_calib_status"),
            Axis::FluxCalibration => Some("o_calib_status"),
            Axis::WavelengthCalibration => Some("em_calib_status"),
            _ => None,
        }
    }
}

const IMAGE_AXES: &[Axis] = &[
    Axis::Spatial,
    Axis::Spectral,
    Axis::Temporal,
    Axis::Polarization,
    Axis::SpatialResolution,
    Axis::SpectralResolution,
    Axis::ResolvingPower,
    Axis::Identifier,
    Axis::Collection,
    Axis::AstrometricCalibration,
    Axis::FluxCalibration,
    Axis::DatasetShape,
];

const SPECTRUM_AXES: &[Axis] = &[
    Axis::Spatial,
    Axis::Spectral,
    Axis::Temporal,
    Axis::Polarization,
    Axis::SpatialResolution,
    Axis::SpectralResolution,
    Axis::ResolvingPower,
    Axis::Identifier,
    Axis::Collection,
    Axis::FluxCalibration,
    Axis::WavelengthCalibration,
];

const CONE_AXES: &[Axis] = &[Axis::Spatial];

const IMAGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::service("VERSION", ParamKind::Text, "Protocol version"),
    ParamSpec::service("REQUEST", ParamKind::Text, "Operation to be performed"),
    ParamSpec::core("POS", ParamKind::NUMERIC_LIST, "Central coordinates of search region"),
    ParamSpec::core("SIZE", ParamKind::NUMERIC_LIST, "Half-width[,half-height] of the search region"),
    ParamSpec::core("BAND", ParamKind::NUMERIC_RANGES, "Spectral bandpass of the search region"),
    ParamSpec::core("TIME", ParamKind::DATE_RANGES, "Range of times for the search region"),
    ParamSpec::core("POL", ParamKind::STRING_LIST, "Polarization types of interest"),
    ParamSpec::core("FORMAT", ParamKind::STRING_LIST, "Allowable output data formats"),
    ParamSpec::core("MODE", ParamKind::Text, "Query mode"),
    ParamSpec::extension("SPECRES", ParamKind::Float, "Minimum spectral resolution"),
    ParamSpec::extension("SPECRP", ParamKind::Float, "Spectral resolving power"),
    ParamSpec::extension("SPATRES", ParamKind::Float, "Minimum spatial resolution"),
    ParamSpec::extension("ASTCalib", ParamKind::Text, "Minimum level of astrometric calibration"),
    ParamSpec::extension("FluxCalib", ParamKind::Text, "Minimum level of flux calibration"),
    ParamSpec::extension("TYPE", ParamKind::Text, "Dataset type"),
    ParamSpec::extension("PubDID", ParamKind::Text, "Publisher-assigned dataset identifier"),
    ParamSpec::extension("Collection", ParamKind::Text, "Data collection names or patterns"),
    ParamSpec::core("MAXREC", ParamKind::Integer, "Maximum number of output records"),
    ParamSpec::core("VERB", ParamKind::Integer, "Output verbosity level"),
    ParamSpec::service("RUNID", ParamKind::Text, "Runtime job ID string"),
];

const SPECTRUM_PARAMS: &[ParamSpec] = &[
    ParamSpec::service("VERSION", ParamKind::Text, "Protocol version"),
    ParamSpec::service("REQUEST", ParamKind::Text, "Operation to be performed"),
    ParamSpec::core("POS", ParamKind::NUMERIC_LIST, "Central coordinates of search region"),
    ParamSpec::core("SIZE", ParamKind::NUMERIC_LIST, "Radius of the search region"),
    ParamSpec::core("BAND", ParamKind::NUMERIC_RANGES, "Spectral bandpass of the search region"),
    ParamSpec::core("TIME", ParamKind::DATE_RANGES, "Range of times for the search region"),
    ParamSpec::extension("POL", ParamKind::STRING_LIST, "Polarization types of interest"),
    ParamSpec::core("FORMAT", ParamKind::STRING_LIST, "Allowable output data formats"),
    ParamSpec::core("MODE", ParamKind::Text, "Query mode"),
    ParamSpec::extension("SPECRES", ParamKind::Float, "Minimum spectral resolution"),
    ParamSpec::extension("SPECRP", ParamKind::Float, "Spectral resolving power"),
    ParamSpec::extension("SPATRES", ParamKind::Float, "Minimum spatial resolution"),
    ParamSpec::extension("FluxCalib", ParamKind::Text, "Spectrum is flux calibrated"),
    ParamSpec::extension("WaveCalib", ParamKind::Text, "Spectrum is wavelength calibrated"),
    ParamSpec::extension("PubDID", ParamKind::Text, "Publisher-assigned dataset identifier"),
    ParamSpec::extension("Collection", ParamKind::Text, "Data collection names or patterns"),
    ParamSpec::core("MAXREC", ParamKind::Integer, "Maximum number of output records"),
    ParamSpec::core("VERB", ParamKind::Integer, "Output verbosity level"),
    ParamSpec::service("RUNID", ParamKind::Text, "Runtime job ID string"),
];

const CONE_PARAMS: &[ParamSpec] = &[
    ParamSpec::core("RA", ParamKind::Float, "Right ascension of the search center"),
    ParamSpec::core("DEC", ParamKind::Float, "Declination of the search center"),
    ParamSpec::core("SR", ParamKind::Float, "Search radius"),
    ParamSpec::extension("POS", ParamKind::NUMERIC_LIST, "Central coordinates of search region"),
    ParamSpec::extension("SIZE", ParamKind::NUMERIC_LIST, "Radius of the search region"),
    ParamSpec::core("MAXREC", ParamKind::Integer, "Maximum number of output records"),
    ParamSpec::core("VERB", ParamKind::Integer, "Output verbosity level"),
    ParamSpec::service("RUNID", ParamKind::Text, "Runtime job ID string"),
];

impl Protocol {
    /// Parse a protocol name as used in configuration and on the command line.
    pub fn from_name(s: &str) -> DalResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "sia" | "siap" => Ok(Protocol::Image),
            "spectrum" | "ssa" | "ssap" => Ok(Protocol::Spectrum),
            "cone" | "scs" => Ok(Protocol::Cone),
            other => Err(DalError::invalid_parameter(
                "protocol",
                format!("unknown protocol '{}'", other),
            )),
        }
    }

    /// Short protocol name.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Image => "SIAP",
            Protocol::Spectrum => "SSAP",
            Protocol::Cone => "SCS",
        }
    }

    /// Prefix of the data-model utypes of this protocol's fields.
    pub fn utype_prefix(&self) -> &'static str {
        match self {
            Protocol::Image => "im",
            Protocol::Spectrum => "ssa",
            Protocol::Cone => "scs",
        }
    }

    pub fn axes(&self) -> &'static [Axis] {
        match self {
            Protocol::Image => IMAGE_AXES,
            Protocol::Spectrum => SPECTRUM_AXES,
            Protocol::Cone => CONE_AXES,
        }
    }

    pub fn supports(&self, axis: Axis) -> bool {
        self.axes().contains(&axis)
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Protocol::Image => IMAGE_PARAMS,
            Protocol::Spectrum => SPECTRUM_PARAMS,
            Protocol::Cone => CONE_PARAMS,
        }
    }

    /// Look up a parameter declaration, ignoring case.
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        let name = name.trim();
        self.params()
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    /// MIME type of an archival dataset.
    pub fn archival_mime(&self) -> &'static str {
        match self {
            Protocol::Image => "image/fits",
            Protocol::Spectrum => "application/fits",
            Protocol::Cone => "application/x-votable+xml",
        }
    }

    /// Whether records carry synthesized dataset identifiers and access URLs.
    pub fn synthesizes_access(&self) -> bool {
        !matches!(self, Protocol::Cone)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Protocol::from_name("SIAP").unwrap(), Protocol::Image);
        assert_eq!(Protocol::from_name("ssa").unwrap(), Protocol::Spectrum);
        assert_eq!(Protocol::from_name("Cone").unwrap(), Protocol::Cone);
        assert!(Protocol::from_name("tap").is_err());
    }

    #[test]
    fn test_axes() {
        assert!(Protocol::Image.supports(Axis::Polarization));
        assert!(!Protocol::Spectrum.supports(Axis::AstrometricCalibration));
        assert!(Protocol::Spectrum.supports(Axis::WavelengthCalibration));
        assert_eq!(Protocol::Cone.axes(), &[Axis::Spatial]);
    }

    #[test]
    fn test_param_lookup_ignores_case() {
        let spec = Protocol::Image.param("astcalib").unwrap();
        assert_eq!(spec.name, "ASTCalib");
        assert!(Protocol::Cone.param("SR").is_some());
        assert!(Protocol::Cone.param("BAND").is_none());
    }
}
