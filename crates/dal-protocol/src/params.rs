//! Query parameters: declarations, typed values and the request parameter set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use dal_common::{DalError, DalResult};

use crate::protocol::Protocol;
use crate::range::{RangeSet, ValueType};

/// Scope of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLevel {
    /// Defined by the protocol standard.
    Core,
    /// Optional protocol extension.
    Extension,
    /// Supplied by the client without a protocol definition.
    Client,
    /// Used by the service itself.
    Service,
}

/// How a parameter value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A range list with an optional declared element type.
    Ranges {
        value_type: Option<ValueType>,
        ordered: bool,
    },
    Text,
    Float,
    Integer,
    Boolean,
}

impl ParamKind {
    pub const NUMERIC_LIST: ParamKind = ParamKind::Ranges {
        value_type: Some(ValueType::Numeric),
        ordered: false,
    };
    pub const NUMERIC_RANGES: ParamKind = ParamKind::Ranges {
        value_type: Some(ValueType::Numeric),
        ordered: true,
    };
    pub const DATE_RANGES: ParamKind = ParamKind::Ranges {
        value_type: Some(ValueType::IsoDate),
        ordered: true,
    };
    pub const STRING_LIST: ParamKind = ParamKind::Ranges {
        value_type: Some(ValueType::String),
        ordered: false,
    };
}

/// Declaration of one protocol parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub level: ParamLevel,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn core(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            level: ParamLevel::Core,
            description,
        }
    }

    pub const fn extension(
        name: &'static str,
        kind: ParamKind,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            level: ParamLevel::Extension,
            description,
        }
    }

    pub const fn service(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            level: ParamLevel::Service,
            description,
        }
    }
}

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Ranges(RangeSet),
    Text(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

/// One parameter as supplied by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    level: ParamLevel,
    raw: String,
    value: ParamValue,
}

impl Param {
    /// Declared name of the parameter, or the client's spelling if undeclared.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> ParamLevel {
        self.level
    }

    /// The value exactly as supplied, trimmed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }
}

/// The parameters of one request, keyed case-insensitively.
///
/// A parameter supplied with an empty value counts as not set. Range-list
/// parameters given more than once accumulate into one set; any other
/// repeated parameter keeps its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: BTreeMap<String, Param>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert raw name/value pairs using the protocol's declarations.
    ///
    /// Undeclared names are kept as client-level text parameters. Any
    /// conversion failure rejects the whole request.
    pub fn parse<I, K, V>(protocol: Protocol, pairs: I) -> DalResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.set(protocol, name.as_ref(), value.as_ref())?;
        }
        Ok(set)
    }

    /// Set one parameter, converting the value per its declaration.
    pub fn set(&mut self, protocol: Protocol, name: &str, value: &str) -> DalResult<()> {
        let value = value.trim();
        let key = name.trim().to_ascii_lowercase();
        if value.is_empty() {
            self.params.remove(&key);
            return Ok(());
        }

        let spec = protocol.param(name);
        let (name, level, kind) = match spec {
            Some(spec) => (spec.name.to_string(), spec.level, spec.kind),
            None => (name.trim().to_string(), ParamLevel::Client, ParamKind::Text),
        };

        if let ParamKind::Ranges { .. } = kind {
            if let Some(existing) = self.params.get_mut(&key) {
                if let ParamValue::Ranges(set) = &mut existing.value {
                    set.parse_into(value).map_err(|e| with_param(&name, e))?;
                    existing.raw = format!("{},{}", existing.raw, value);
                    return Ok(());
                }
            }
        }

        let converted = convert(&name, kind, value)?;
        self.params.insert(
            key,
            Param {
                name,
                level,
                raw: value.to_string(),
                value: converted,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(&name.to_ascii_lowercase())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Raw text of a parameter.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(Param::raw)
    }

    pub fn ranges(&self, name: &str) -> Option<&RangeSet> {
        match self.get(name).map(Param::value) {
            Some(ParamValue::Ranges(set)) => Some(set),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name).map(Param::value) {
            Some(ParamValue::Float(v)) => Some(*v),
            Some(ParamValue::Integer(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name).map(Param::value) {
            Some(ParamValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name).map(Param::value) {
            Some(ParamValue::Boolean(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.values()
    }
}

fn with_param(name: &str, err: DalError) -> DalError {
    match err {
        DalError::Parse(msg) => DalError::Parse(format!("{}: {}", name, msg)),
        other => other,
    }
}

fn convert(name: &str, kind: ParamKind, value: &str) -> DalResult<ParamValue> {
    match kind {
        ParamKind::Ranges {
            value_type,
            ordered,
        } => RangeSet::parse(value, value_type, ordered)
            .map(ParamValue::Ranges)
            .map_err(|e| with_param(name, e)),
        ParamKind::Text => Ok(ParamValue::Text(value.to_string())),
        ParamKind::Float => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(ParamValue::Float(v)),
            _ => Err(DalError::invalid_parameter(
                name,
                format!("'{}' is not a finite number", value),
            )),
        },
        ParamKind::Integer => value
            .parse::<i64>()
            .map(ParamValue::Integer)
            .map_err(|_| {
                DalError::invalid_parameter(name, format!("'{}' is not an integer", value))
            }),
        ParamKind::Boolean => match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(ParamValue::Boolean(true)),
            "false" | "no" | "0" => Ok(ParamValue::Boolean(false)),
            _ => Err(DalError::invalid_parameter(
                name,
                format!("'{}' is not a boolean", value),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let params = ParamSet::parse(Protocol::Image, [("pos", "10,20"), ("MaxRec", "5")]).unwrap();
        assert_eq!(params.get("POS").unwrap().name(), "POS");
        assert_eq!(params.integer("MAXREC"), Some(5));
        assert_eq!(params.ranges("Pos").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_value_is_unset() {
        let params = ParamSet::parse(Protocol::Image, [("BAND", "  "), ("FORMAT", "")]).unwrap();
        assert!(!params.is_set("BAND"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_undeclared_param_is_client_text() {
        let params = ParamSet::parse(Protocol::Image, [("Flavor", "strange")]).unwrap();
        let p = params.get("flavor").unwrap();
        assert_eq!(p.level(), ParamLevel::Client);
        assert_eq!(p.value(), &ParamValue::Text("strange".to_string()));
    }

    #[test]
    fn test_conversion_errors() {
        let err = ParamSet::parse(Protocol::Image, [("MAXREC", "many")]).unwrap_err();
        assert!(matches!(err, DalError::InvalidParameter { ref param, .. } if param == "MAXREC"));

        let err = ParamSet::parse(Protocol::Image, [("BAND", "1/2/3")]).unwrap_err();
        assert!(matches!(err, DalError::Parse(ref msg) if msg.starts_with("BAND")));
    }

    #[test]
    fn test_repeated_range_param_accumulates() {
        let params =
            ParamSet::parse(Protocol::Image, [("POL", "I"), ("POL", "Q,U")]).unwrap();
        assert_eq!(params.ranges("POL").unwrap().len(), 3);
        assert_eq!(params.text("POL"), Some("I,Q,U"));
    }
}
