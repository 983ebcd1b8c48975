//! Range lists: the interval mini-language of DAL query parameters.
//!
//! A range list is a comma-separated sequence of ranges, optionally
//! followed by a `;` and comma-separated global properties:
//!
//! ```text
//! 1.2e-7/3.0e-7,5e-7/;source,frame=ICRS
//! ```
//!
//! Within one range `/` separates the low and high bounds. A missing low
//! bound gives a high-only range, a missing high bound a low-only range,
//! a lone `/` the unbounded range, and no `/` at all a single value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use dal_common::time::{format_iso_date, looks_like_iso_date, parse_iso_date, to_mjd};
use dal_common::{DalError, DalResult};

/// Element type of a range list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Numeric,
    String,
    IsoDate,
}

/// One endpoint value of a range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RangeValue {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl RangeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RangeValue::Number(_) => ValueType::Numeric,
            RangeValue::Text(_) => ValueType::String,
            RangeValue::Date(_) => ValueType::IsoDate,
        }
    }

    /// Numeric view of the value. Dates convert to MJD.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RangeValue::Number(v) => Some(*v),
            RangeValue::Date(d) => Some(to_mjd(d)),
            RangeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            RangeValue::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Order two values. Values of different types order by type so the
    /// result stays total, but ordered lists never hold mixed types.
    fn compare(&self, other: &RangeValue) -> Ordering {
        match (self, other) {
            (RangeValue::Number(a), RangeValue::Number(b)) => a.total_cmp(b),
            (RangeValue::Text(a), RangeValue::Text(b)) => a.cmp(b),
            (RangeValue::Date(a), RangeValue::Date(b)) => a.cmp(b),
            _ => type_rank(self.value_type()).cmp(&type_rank(other.value_type())),
        }
    }
}

fn type_rank(t: ValueType) -> u8 {
    match t {
        ValueType::Numeric => 0,
        ValueType::IsoDate => 1,
        ValueType::String => 2,
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeValue::Number(v) => write!(f, "{}", v),
            RangeValue::Text(s) => write!(f, "{}", s),
            RangeValue::Date(d) => write!(f, "{}", format_iso_date(d)),
        }
    }
}

/// Shape of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeKind {
    /// Unbounded on both sides (`/`).
    Any,
    /// Bounded below only (`lo/`).
    LowOnly,
    /// Bounded above only (`/hi`).
    HighOnly,
    /// Bounded on both sides (`lo/hi`).
    Closed,
    /// A single value (`v`).
    Single,
}

/// One interval of a range list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Range {
    kind: RangeKind,
    low: Option<RangeValue>,
    high: Option<RangeValue>,
}

impl Range {
    pub fn any() -> Self {
        Self {
            kind: RangeKind::Any,
            low: None,
            high: None,
        }
    }

    pub fn single(value: RangeValue) -> Self {
        Self {
            kind: RangeKind::Single,
            low: Some(value.clone()),
            high: Some(value),
        }
    }

    pub fn at_least(low: RangeValue) -> Self {
        Self {
            kind: RangeKind::LowOnly,
            low: Some(low),
            high: None,
        }
    }

    pub fn at_most(high: RangeValue) -> Self {
        Self {
            kind: RangeKind::HighOnly,
            low: None,
            high: Some(high),
        }
    }

    /// A closed range. Both endpoints must share one type.
    pub fn closed(low: RangeValue, high: RangeValue) -> DalResult<Self> {
        if low.value_type() != high.value_type() {
            return Err(DalError::parse(format!(
                "range endpoints '{}' and '{}' have different types",
                low, high
            )));
        }
        Ok(Self {
            kind: RangeKind::Closed,
            low: Some(low),
            high: Some(high),
        })
    }

    pub fn kind(&self) -> RangeKind {
        self.kind
    }

    /// Lower bound; `None` means unbounded below.
    pub fn low(&self) -> Option<&RangeValue> {
        self.low.as_ref()
    }

    /// Upper bound; `None` means unbounded above.
    pub fn high(&self) -> Option<&RangeValue> {
        self.high.as_ref()
    }

    /// The single or first value of the range.
    pub fn value(&self) -> Option<&RangeValue> {
        self.low.as_ref().or(self.high.as_ref())
    }

    /// Element type of the range; `None` for the unbounded range.
    pub fn value_type(&self) -> Option<ValueType> {
        self.value().map(RangeValue::value_type)
    }

    /// Numeric bounds of the range, dates converted to MJD.
    pub fn numeric_bounds(&self) -> (Option<f64>, Option<f64>) {
        (
            self.low.as_ref().and_then(RangeValue::as_f64),
            self.high.as_ref().and_then(RangeValue::as_f64),
        )
    }

    fn normalize(&mut self) {
        if self.kind == RangeKind::Closed {
            if let (Some(lo), Some(hi)) = (&self.low, &self.high) {
                if lo.compare(hi) == Ordering::Greater {
                    std::mem::swap(&mut self.low, &mut self.high);
                }
            }
        }
    }

    /// Ordering used by ordered range lists: by lower bound, unbounded
    /// first, then by upper bound, unbounded last.
    pub fn cmp_ordered(&self, other: &Range) -> Ordering {
        let lower = match (&self.low, &other.low) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.compare(b),
        };
        lower.then_with(|| match (&self.high, &other.high) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.compare(b),
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.low, &self.high) {
            (RangeKind::Single, Some(v), _) => write!(f, "{}", v),
            (RangeKind::Closed, Some(lo), Some(hi)) => write!(f, "{}/{}", lo, hi),
            (RangeKind::LowOnly, Some(lo), _) => write!(f, "{}/", lo),
            (RangeKind::HighOnly, _, Some(hi)) => write!(f, "/{}", hi),
            _ => write!(f, "/"),
        }
    }
}

/// A parsed range list: ranges plus named global properties.
///
/// An ordered set keeps its ranges sorted (duplicates kept) and rejects a
/// range whose type differs from the set's type. An unordered set keeps
/// insertion order and tolerates mixed types. The type is fixed either at
/// construction or by the first range that is not unbounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSet {
    ordered: bool,
    declared: bool,
    value_type: Option<ValueType>,
    ranges: Vec<Range>,
    properties: Vec<(String, String)>,
}

impl RangeSet {
    /// Create an empty range set, optionally with a declared element type.
    pub fn new(declared: Option<ValueType>, ordered: bool) -> Self {
        Self {
            ordered,
            declared: declared.is_some(),
            value_type: declared,
            ranges: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Parse a range-list string into a new set.
    pub fn parse(text: &str, declared: Option<ValueType>, ordered: bool) -> DalResult<Self> {
        let mut set = Self::new(declared, ordered);
        set.parse_into(text)?;
        Ok(set)
    }

    /// Parse a range-list string and add its ranges and properties to this set.
    ///
    /// May be called repeatedly to accumulate several lists into one set.
    /// Returns the number of items (ranges plus properties) added.
    pub fn parse_into(&mut self, text: &str) -> DalResult<usize> {
        let (range_part, property_part) = match text.split_once(';') {
            Some((ranges, props)) => (ranges, Some(props)),
            None => (text, None),
        };

        let mut items = 0;
        for element in range_part.split(',') {
            let element = element.trim();
            if element.is_empty() {
                continue;
            }
            let range = self.parse_range(element)?;
            self.push(range)?;
            items += 1;
        }

        if let Some(props) = property_part {
            for item in props.split([',', ';']) {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                match item.split_once('=') {
                    Some((key, _)) if key.trim().is_empty() => {
                        return Err(DalError::parse(format!(
                            "property '{}' has no name",
                            item
                        )));
                    }
                    Some((key, value)) => self.set_property(key.trim(), Some(value.trim())),
                    None => self.set_property(item, None),
                }
                items += 1;
            }
        }

        Ok(items)
    }

    fn slash_is_separator(&self) -> bool {
        !(self.declared && self.value_type == Some(ValueType::String))
    }

    fn parse_range(&self, element: &str) -> DalResult<Range> {
        if !self.slash_is_separator() {
            return Ok(Range::single(RangeValue::Text(element.to_string())));
        }

        let mut parts = element.splitn(3, '/');
        let first = parts.next().unwrap_or("").trim();
        let second = parts.next().map(str::trim);
        if parts.next().is_some() {
            return Err(DalError::parse(format!(
                "malformed range '{}': too many '/' separators",
                element
            )));
        }

        // Dates are parsed as dates on both sides of the separator.
        let as_date = self.value_type == Some(ValueType::IsoDate)
            || (!self.declared
                && (looks_like_iso_date(first) || second.is_some_and(looks_like_iso_date)));

        let value = |token: &str| -> DalResult<RangeValue> {
            if as_date {
                parse_iso_date(token)
                    .map(RangeValue::Date)
                    .map_err(|e| DalError::parse(e.to_string()))
            } else {
                Ok(infer_value(token))
            }
        };

        match second {
            None => Ok(Range::single(value(first)?)),
            Some(second) => match (first.is_empty(), second.is_empty()) {
                (true, true) => Ok(Range::any()),
                (false, true) => Ok(Range::at_least(value(first)?)),
                (true, false) => Ok(Range::at_most(value(second)?)),
                (false, false) => Range::closed(value(first)?, value(second)?),
            },
        }
    }

    /// Add a range, enforcing the type rule of ordered sets.
    pub fn push(&mut self, mut range: Range) -> DalResult<()> {
        if let Some(t) = range.value_type() {
            match self.value_type {
                None => self.value_type = Some(t),
                Some(current) if current != t && self.ordered => {
                    return Err(DalError::parse(format!(
                        "types cannot be mixed in range list: '{}' is not {:?}",
                        range, current
                    )));
                }
                _ => {}
            }
        }

        if self.ordered {
            range.normalize();
            let at = self
                .ranges
                .partition_point(|r| r.cmp_ordered(&range) != Ordering::Greater);
            self.ranges.insert(at, range);
        } else {
            self.ranges.push(range);
        }
        Ok(())
    }

    /// Set a global property. A bare key gets the value "true"; setting an
    /// existing key again replaces its value in place.
    pub fn set_property(&mut self, key: &str, value: Option<&str>) {
        let value = value.unwrap_or("true").to_string();
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key.to_string(), value)),
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    /// Whether the ranges hold more than one element type.
    pub fn is_mixed(&self) -> bool {
        let mut types = self.ranges.iter().filter_map(Range::value_type);
        match types.next() {
            Some(first) => types.any(|t| t != first),
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }

    /// Get one range by position.
    pub fn get(&self, index: usize) -> DalResult<&Range> {
        self.ranges
            .get(index)
            .ok_or_else(|| DalError::parse(format!("range list has no element {}", index)))
    }

    /// Numeric value of a single-valued element.
    pub fn f64_at(&self, index: usize) -> DalResult<f64> {
        let range = self.get(index)?;
        range
            .value()
            .and_then(RangeValue::as_f64)
            .ok_or_else(|| DalError::parse(format!("element '{}' is not numeric", range)))
    }

    /// String value of a single-valued element.
    pub fn str_at(&self, index: usize) -> DalResult<String> {
        let range = self.get(index)?;
        range
            .value()
            .map(ToString::to_string)
            .ok_or_else(|| DalError::parse(format!("element {} has no value", index)))
    }
}

/// Infer the type of an undeclared token: numbers must contain a digit so
/// that words like "inf" and "nan" stay strings.
fn infer_value(token: &str) -> RangeValue {
    if token.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(v) = token.parse::<f64>() {
            return RangeValue::Number(v);
        }
    }
    RangeValue::Text(token.to_string())
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", range)?;
        }
        if !self.properties.is_empty() {
            write!(f, ";")?;
            for (i, (k, v)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", k, v)?;
            }
        }
        Ok(())
    }
}

impl FromStr for RangeSet {
    type Err = DalError;

    /// Parse an ordered range list whose type is inferred from its content.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeSet::parse(s, None, true)
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
