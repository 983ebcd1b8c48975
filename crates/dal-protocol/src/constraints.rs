//! Compile request parameters into a catalog query.
//!
//! Each supported axis contributes at most one predicate. Predicates are
//! joined with `AND` into a `SELECT * FROM <table> WHERE ...` statement.
//! Every failure surfaces here, before any query reaches the catalog.

use serde::Serialize;
use tracing::warn;

use dal_common::sky::normalize_longitude;
use dal_common::{CoordinateFrame, DalError, DalResult, SkyBox};

use crate::context::RequestContext;
use crate::params::ParamSet;
use crate::protocol::{Axis, Protocol};
use crate::range::RangeKind;
use crate::table::TableConfiguration;

/// Half-width of the search region when SIZE is not given, in degrees.
pub const DEFAULT_HALF_WIDTH: f64 = 0.1;

/// The coarse box spans this multiple of the search half-widths.
pub const COARSE_MARGIN: f64 = 2.0;

/// A SIZE of this many degrees disables the spatial constraint.
const ALL_SKY_SIZE: f64 = 180.0;

/// At most this many polarization states are matched.
const MAX_POL_STATES: usize = 4;

/// Category of a compiled predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    Spatial,
    Spectral,
    Temporal,
    Polarization,
    Resolution,
    Identifier,
    Collection,
    Calibration,
    DatasetShape,
}

/// One predicate of the compiled query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    /// Request parameter the predicate came from.
    pub param: &'static str,
    pub predicate: String,
}

/// The region of a positional search, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpatialRegion {
    pub center_lon: f64,
    pub center_lat: f64,
    pub half_lon: f64,
    pub half_lat: f64,
    pub frame: CoordinateFrame,
    /// Whether dataset footprints widen the acceptance radius.
    pub footprint: bool,
}

impl SpatialRegion {
    /// Acceptance radius before any footprint term.
    pub fn radius(&self) -> f64 {
        self.half_lon.max(self.half_lat)
    }

    /// Box the catalog pre-filters on.
    pub fn coarse_box(&self) -> SkyBox {
        SkyBox::around(
            self.center_lon,
            self.center_lat,
            COARSE_MARGIN * self.half_lon,
            COARSE_MARGIN * self.half_lat,
        )
    }
}

/// A numeric interval, unbounded on a side when that bound is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// A compiled catalog query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub table: String,
    pub constraints: Vec<Constraint>,
    /// Full query text sent to the catalog.
    pub text: String,
    /// Maximum number of output records; zero asks for metadata only.
    pub row_cap: usize,
    pub region: Option<SpatialRegion>,
    pub band: Option<Interval>,
    /// Time interval in MJD.
    pub time: Option<Interval>,
    /// Requested polarization states.
    pub pol: Option<String>,
}

impl CompiledQuery {
    pub fn is_metadata_only(&self) -> bool {
        self.row_cap == 0
    }

    /// The WHERE clause without the keyword, if any predicate applies.
    pub fn where_clause(&self) -> Option<String> {
        if self.constraints.is_empty() {
            return None;
        }
        Some(
            self.constraints
                .iter()
                .map(|c| c.predicate.as_str())
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }
}

/// Escape a user-supplied value for use inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Catalog key of a publisher dataset identifier: the text after its last ':'.
pub fn dataset_key(pub_did: &str) -> &str {
    match pub_did.rfind(':') {
        Some(i) => &pub_did[i + 1..],
        None => pub_did,
    }
}

/// Turns a parameter set into a [`CompiledQuery`] for one protocol.
pub struct ConstraintCompiler<'a> {
    protocol: Protocol,
    table: &'a dyn TableConfiguration,
}

impl<'a> ConstraintCompiler<'a> {
    pub fn new(protocol: Protocol, table: &'a dyn TableConfiguration) -> Self {
        Self { protocol, table }
    }

    pub fn compile(&self, params: &ParamSet, ctx: &RequestContext) -> DalResult<CompiledQuery> {
        let table = ctx.require_table()?.to_string();
        let row_cap = row_cap(params, ctx)?;

        let region = self.spatial_region(params)?;
        let band = if self.protocol.supports(Axis::Spectral) {
            intervals(params, "BAND")?
        } else {
            Vec::new()
        };
        let time = if self.protocol.supports(Axis::Temporal) {
            intervals(params, "TIME")?
        } else {
            Vec::new()
        };

        let mut constraints = Vec::new();
        for axis in self.protocol.axes() {
            let constraint = match axis {
                Axis::Spatial => region.as_ref().map(|r| self.spatial(r)),
                Axis::Spectral => self.intervals_constraint(
                    ConstraintKind::Spectral,
                    "BAND",
                    ("em_min", "em_max"),
                    &band,
                ),
                Axis::Temporal => self.intervals_constraint(
                    ConstraintKind::Temporal,
                    "TIME",
                    ("t_min", "t_max"),
                    &time,
                ),
                Axis::Polarization => self.polarization(params),
                Axis::SpatialResolution => self.minimum(params, "SPATRES", "s_resolution"),
                Axis::SpectralResolution => self.minimum(params, "SPECRES", "em_resolution"),
                Axis::ResolvingPower => self.minimum(params, "SPECRP", "em_res_power"),
                Axis::Identifier => self.identifier(params),
                Axis::Collection => self.collection(params),
                Axis::AstrometricCalibration => self.calibration(params, "ASTCalib", *axis),
                Axis::FluxCalibration => self.calibration(params, "FluxCalib", *axis),
                Axis::WavelengthCalibration => self.calibration(params, "WaveCalib", *axis),
                Axis::DatasetShape => self.dataset_shape(params),
            };
            constraints.extend(constraint);
        }

        let text = if row_cap == 0 {
            format!("SELECT * FROM {} WHERE (1 = 0)", table)
        } else if constraints.is_empty() {
            format!("SELECT * FROM {}", table)
        } else {
            let predicates: Vec<&str> = constraints.iter().map(|c| c.predicate.as_str()).collect();
            format!("SELECT * FROM {} WHERE {}", table, predicates.join(" AND "))
        };

        Ok(CompiledQuery {
            table,
            constraints,
            text,
            row_cap,
            region,
            band: band.first().copied(),
            time: time.first().copied(),
            pol: params.text("POL").map(str::to_string),
        })
    }

    fn col(&self, canonical: &'static str) -> &str {
        self.table.column(canonical)
    }

    /// Resolve the search region from POS/SIZE, or RA/DEC/SR for cone search.
    fn spatial_region(&self, params: &ParamSet) -> DalResult<Option<SpatialRegion>> {
        let is_cone = self.protocol == Protocol::Cone;

        let (lon, lat, frame) = match params.ranges("POS") {
            Some(pos) => {
                let mut frame = CoordinateFrame::Icrs;
                for (key, value) in pos.properties() {
                    let name = if key.eq_ignore_ascii_case("frame") {
                        value
                    } else {
                        key
                    };
                    frame = CoordinateFrame::require_supported(name)?;
                }
                (
                    finite("POS", pos.f64_at(0)?)?,
                    finite("POS", pos.f64_at(1)?)?,
                    frame,
                )
            }
            None if is_cone => match (params.float("RA"), params.float("DEC")) {
                (Some(ra), Some(dec)) => (ra, dec, CoordinateFrame::Icrs),
                (Some(_), None) => return Err(DalError::MissingParameter("DEC".to_string())),
                (None, Some(_)) => return Err(DalError::MissingParameter("RA".to_string())),
                (None, None) if params.is_set("SR") => {
                    return Err(DalError::MissingParameter("RA".to_string()))
                }
                (None, None) => return Ok(None),
            },
            None => return Ok(None),
        };

        if !(-90.0..=90.0).contains(&lat) {
            return Err(DalError::invalid_parameter(
                "POS",
                format!("latitude {} is outside [-90, 90]", lat),
            ));
        }

        let (half_lon, half_lat) = match params.ranges("SIZE") {
            Some(size) => {
                let w = finite("SIZE", size.f64_at(0)?)?;
                let h = if size.len() > 1 {
                    finite("SIZE", size.f64_at(1)?)?
                } else {
                    w
                };
                (w, h)
            }
            None => match params.float("SR") {
                Some(sr) => (sr, sr),
                None => (DEFAULT_HALF_WIDTH, DEFAULT_HALF_WIDTH),
            },
        };

        if half_lon < 0.0 || half_lat < 0.0 {
            return Err(DalError::invalid_parameter(
                "SIZE",
                "search size must not be negative",
            ));
        }

        if (half_lon - ALL_SKY_SIZE).abs() < 1e-6 {
            return Ok(None);
        }

        Ok(Some(SpatialRegion {
            center_lon: normalize_longitude(lon),
            center_lat: lat,
            half_lon,
            half_lat,
            frame,
            footprint: !is_cone,
        }))
    }

    fn spatial(&self, region: &SpatialRegion) -> Constraint {
        let coarse = region.coarse_box();
        let lon_col = self.col(if self.protocol == Protocol::Cone {
            "ra"
        } else {
            "s_ra"
        });
        let lat_col = self.col(if self.protocol == Protocol::Cone {
            "dec"
        } else {
            "s_dec"
        });

        let lat_term = format!(
            "({} BETWEEN {} AND {})",
            lat_col, coarse.lat_min, coarse.lat_max
        );

        let predicate = if coarse.constrains_lon() {
            let ranges: Vec<String> = coarse
                .lon_ranges()
                .iter()
                .map(|(lo, hi)| format!("{} BETWEEN {} AND {}", lon_col, lo, hi))
                .collect();
            format!("({}) AND {}", ranges.join(" OR "), lat_term)
        } else {
            lat_term
        };

        Constraint {
            kind: ConstraintKind::Spatial,
            param: "POS",
            predicate,
        }
    }

    fn intervals_constraint(
        &self,
        kind: ConstraintKind,
        param: &'static str,
        (low_col, high_col): (&'static str, &'static str),
        intervals: &[Interval],
    ) -> Option<Constraint> {
        let low_col = self.col(low_col);
        let high_col = self.col(high_col);

        let groups: Vec<String> = intervals
            .iter()
            .filter_map(|i| interval_predicate(low_col, high_col, i))
            .collect();

        let predicate = match groups.len() {
            0 => return None,
            1 => groups.into_iter().next()?,
            _ => format!(
                "({})",
                groups
                    .iter()
                    .map(|g| format!("({})", g))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ),
        };

        Some(Constraint {
            kind,
            param,
            predicate,
        })
    }

    fn polarization(&self, params: &ParamSet) -> Option<Constraint> {
        let raw = params.text("POL")?;
        let col = self.col("pol_states");

        let predicate = if raw.eq_ignore_ascii_case("any") {
            format!("({} IS NOT NULL)", col)
        } else {
            let states: Vec<String> = if raw.eq_ignore_ascii_case("stokes") {
                ["I", "Q", "U", "V"].iter().map(|s| s.to_string()).collect()
            } else {
                params
                    .ranges("POL")?
                    .iter()
                    .filter_map(|r| r.value().map(ToString::to_string))
                    .take(MAX_POL_STATES)
                    .collect()
            };
            if states.is_empty() {
                return None;
            }
            like_any(col, &states)
        };

        Some(Constraint {
            kind: ConstraintKind::Polarization,
            param: "POL",
            predicate,
        })
    }

    fn minimum(
        &self,
        params: &ParamSet,
        param: &'static str,
        canonical: &'static str,
    ) -> Option<Constraint> {
        let value = params.float(param)?;
        let col = self.col(canonical);
        Some(Constraint {
            kind: ConstraintKind::Resolution,
            param,
            predicate: format!("({} >= {} OR {} IS NULL)", col, value, col),
        })
    }

    fn identifier(&self, params: &ParamSet) -> Option<Constraint> {
        let pub_did = params.text("PubDID")?;
        Some(Constraint {
            kind: ConstraintKind::Identifier,
            param: "PubDID",
            predicate: format!(
                "({} = '{}')",
                self.col("id"),
                escape_literal(dataset_key(pub_did))
            ),
        })
    }

    fn collection(&self, params: &ParamSet) -> Option<Constraint> {
        let raw = params.text("Collection")?;
        if raw.eq_ignore_ascii_case("all") {
            return None;
        }
        let names: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return None;
        }
        Some(Constraint {
            kind: ConstraintKind::Collection,
            param: "Collection",
            predicate: like_any(self.col("obs_collection"), &names),
        })
    }

    fn calibration(&self, params: &ParamSet, param: &'static str, axis: Axis) -> Option<Constraint> {
        let level = params.text(param)?;
        let col = self.col(axis.calibration_column()?);
        let predicate = match level.to_ascii_lowercase().as_str() {
            "relative" => format!("({} LIKE '%relative%' OR {} LIKE '%absolute%')", col, col),
            "absolute" => format!("({} LIKE '%absolute%')", col),
            other => {
                warn!(param = param, value = other, "Ignoring unknown calibration level");
                return None;
            }
        };
        Some(Constraint {
            kind: ConstraintKind::Calibration,
            param,
            predicate,
        })
    }

    fn dataset_shape(&self, params: &ParamSet) -> Option<Constraint> {
        let kind = params.text("TYPE")?;
        let col = self.col("im_naxes");
        let predicate = match kind.to_ascii_lowercase().as_str() {
            "image" => format!("({} = 2)", col),
            "cube" => format!("({} >= 3)", col),
            other => {
                warn!(value = other, "Ignoring unknown dataset type");
                return None;
            }
        };
        Some(Constraint {
            kind: ConstraintKind::DatasetShape,
            param: "TYPE",
            predicate,
        })
    }
}

/// Predicate matching stored intervals `[low_col, high_col]` that overlap a
/// query interval. Stored bounds that are NULL never exclude a row.
fn interval_predicate(low_col: &str, high_col: &str, interval: &Interval) -> Option<String> {
    let mut terms = Vec::with_capacity(2);
    if let Some(high) = interval.high {
        terms.push(format!("({} <= {} OR {} IS NULL)", low_col, high, low_col));
    }
    if let Some(low) = interval.low {
        terms.push(format!("({} >= {} OR {} IS NULL)", high_col, low, high_col));
    }
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

fn like_any(col: &str, patterns: &[String]) -> String {
    let terms: Vec<String> = patterns
        .iter()
        .map(|p| format!("({} LIKE '%{}%')", col, escape_literal(p)))
        .collect();
    format!("({})", terms.join(" OR "))
}

/// Numeric intervals of a range-list parameter, dates as MJD.
fn intervals(params: &ParamSet, name: &str) -> DalResult<Vec<Interval>> {
    let Some(set) = params.ranges(name) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(set.len());
    for range in set {
        if range.kind() == RangeKind::Any {
            continue;
        }
        let (low, high) = range.numeric_bounds();
        if low.is_none() && high.is_none() {
            return Err(DalError::invalid_parameter(
                name,
                format!("'{}' is not a numeric range", range),
            ));
        }
        for bound in [low, high].into_iter().flatten() {
            finite(name, bound)?;
        }
        out.push(Interval { low, high });
    }
    Ok(out)
}

/// Reject infinite and NaN values before they reach predicate text.
fn finite(name: &str, value: f64) -> DalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DalError::invalid_parameter(
            name,
            format!("{} is not a finite number", value),
        ))
    }
}

/// Effective record cap: the smaller of MAXREC and the service limit.
fn row_cap(params: &ParamSet, ctx: &RequestContext) -> DalResult<usize> {
    match params.integer("MAXREC") {
        Some(n) if n < 0 => Err(DalError::invalid_parameter(
            "MAXREC",
            "must not be negative",
        )),
        Some(n) => Ok((n as usize).min(ctx.max_records)),
        None => Ok(ctx.max_records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableConfig;

    fn ctx() -> RequestContext {
        RequestContext::builder().table_name("images").build()
    }

    fn compile(protocol: Protocol, pairs: &[(&str, &str)]) -> DalResult<CompiledQuery> {
        let params = ParamSet::parse(protocol, pairs.iter().copied())?;
        let table = TableConfig::default();
        ConstraintCompiler::new(protocol, &table).compile(&params, &ctx())
    }

    #[test]
    fn test_no_constraints() {
        let q = compile(Protocol::Image, &[]).unwrap();
        assert_eq!(q.text, "SELECT * FROM images");
        assert!(q.where_clause().is_none());
        assert_eq!(q.row_cap, 1000);
    }

    #[test]
    fn test_band_predicate() {
        let q = compile(Protocol::Image, &[("BAND", "5e-7/6e-7")]).unwrap();
        assert_eq!(
            q.constraints[0].predicate,
            "(em_min <= 0.0000006 OR em_min IS NULL) AND (em_max >= 0.0000005 OR em_max IS NULL)"
        );
        assert_eq!(
            q.band,
            Some(Interval {
                low: Some(5e-7),
                high: Some(6e-7)
            })
        );
    }

    #[test]
    fn test_open_band_has_one_term() {
        let q = compile(Protocol::Spectrum, &[("BAND", "5e-7/")]).unwrap();
        assert_eq!(
            q.constraints[0].predicate,
            "(em_max >= 0.0000005 OR em_max IS NULL)"
        );
    }

    #[test]
    fn test_time_in_mjd() {
        let q = compile(Protocol::Image, &[("TIME", "2010-01-01/2010-01-02")]).unwrap();
        let time = q.time.unwrap();
        assert_eq!(time.low, Some(55197.0));
        assert_eq!(time.high, Some(55198.0));
        assert!(q.text.contains("(t_min <= 55198 OR t_min IS NULL)"));
    }

    #[test]
    fn test_pubdid_escaped() {
        let q = compile(Protocol::Image, &[("PubDID", "ivo://x#images:o'brien")]).unwrap();
        assert_eq!(q.constraints[0].predicate, "(id = 'o''brien')");
    }

    #[test]
    fn test_minimum_resolution() {
        let q = compile(Protocol::Image, &[("SPATRES", "0.5")]).unwrap();
        assert_eq!(
            q.constraints[0].predicate,
            "(s_resolution >= 0.5 OR s_resolution IS NULL)"
        );
    }

    #[test]
    fn test_calibration_levels() {
        let q = compile(Protocol::Spectrum, &[("FluxCalib", "relative")]).unwrap();
        assert_eq!(
            q.constraints[0].predicate,
            "(o_calib_status LIKE '%relative%' OR o_calib_status LIKE '%absolute%')"
        );
        let q = compile(Protocol::Spectrum, &[("WaveCalib", "ABSOLUTE")]).unwrap();
        assert_eq!(q.constraints[0].predicate, "(em_calib_status LIKE '%absolute%')");
        let q = compile(Protocol::Image, &[("ASTCalib", "sometimes")]).unwrap();
        assert!(q.constraints.is_empty());
    }

    #[test]
    fn test_dataset_shape() {
        let q = compile(Protocol::Image, &[("TYPE", "cube")]).unwrap();
        assert_eq!(q.constraints[0].predicate, "(im_naxes >= 3)");
        // Spectra have no dataset shape axis; TYPE is ignored.
        let q = compile(Protocol::Spectrum, &[("TYPE", "cube")]).unwrap();
        assert!(q.constraints.is_empty());
    }

    #[test]
    fn test_mapped_columns() {
        let params = ParamSet::parse(Protocol::Image, [("SPECRES", "2")]).unwrap();
        let table = TableConfig::new().with_column("em_resolution", "specres");
        let q = ConstraintCompiler::new(Protocol::Image, &table)
            .compile(&params, &ctx())
            .unwrap();
        assert_eq!(q.constraints[0].predicate, "(specres >= 2 OR specres IS NULL)");
    }

    #[test]
    fn test_negative_maxrec_rejected() {
        let err = compile(Protocol::Image, &[("MAXREC", "-1")]).unwrap_err();
        assert!(matches!(err, DalError::InvalidParameter { .. }));
    }

    #[test]
    fn test_missing_table() {
        let params = ParamSet::new();
        let table = TableConfig::default();
        let err = ConstraintCompiler::new(Protocol::Cone, &table)
            .compile(&params, &RequestContext::default())
            .unwrap_err();
        assert!(matches!(err, DalError::MissingParameter(_)));
    }

    #[test]
    fn test_dataset_key() {
        assert_eq!(dataset_key("ivo://auth#images:42"), "42");
        assert_eq!(dataset_key("42"), "42");
    }
}
