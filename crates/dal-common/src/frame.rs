//! Celestial coordinate frames.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DalError;

/// Coordinate reference frames a client may name in a POS property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateFrame {
    /// International Celestial Reference System
    Icrs,
    /// FK5 equatorial (J2000)
    Fk5,
    /// FK4 equatorial (B1950)
    Fk4,
    /// Galactic
    Galactic,
    /// Ecliptic
    Ecliptic,
}

impl CoordinateFrame {
    /// Parse a frame name as it appears in a range-list property.
    ///
    /// Matching is case-insensitive. Unknown names are reported as
    /// unsupported frames, the same as known-but-unsupported ones.
    pub fn from_name(s: &str) -> Result<Self, DalError> {
        match s.trim().to_uppercase().as_str() {
            "ICRS" => Ok(CoordinateFrame::Icrs),
            "FK5" | "J2000" => Ok(CoordinateFrame::Fk5),
            "FK4" | "B1950" => Ok(CoordinateFrame::Fk4),
            "GALACTIC" | "GAL" => Ok(CoordinateFrame::Galactic),
            "ECLIPTIC" | "ECL" => Ok(CoordinateFrame::Ecliptic),
            _ => Err(DalError::UnsupportedFrame(s.to_string())),
        }
    }

    /// Only ICRS positions can be searched.
    pub fn is_supported(&self) -> bool {
        matches!(self, CoordinateFrame::Icrs)
    }

    /// Validate a frame name, returning the frame only when it is supported.
    pub fn require_supported(s: &str) -> Result<Self, DalError> {
        let frame = Self::from_name(s)?;
        if frame.is_supported() {
            Ok(frame)
        } else {
            Err(DalError::UnsupportedFrame(s.to_string()))
        }
    }
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        CoordinateFrame::Icrs
    }
}

impl fmt::Display for CoordinateFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinateFrame::Icrs => "ICRS",
            CoordinateFrame::Fk5 => "FK5",
            CoordinateFrame::Fk4 => "FK4",
            CoordinateFrame::Galactic => "GALACTIC",
            CoordinateFrame::Ecliptic => "ECLIPTIC",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame() {
        assert_eq!(
            CoordinateFrame::from_name("ICRS").unwrap(),
            CoordinateFrame::Icrs
        );
        assert_eq!(
            CoordinateFrame::from_name("icrs").unwrap(),
            CoordinateFrame::Icrs
        );
        assert_eq!(
            CoordinateFrame::from_name("fk5").unwrap(),
            CoordinateFrame::Fk5
        );
        assert!(CoordinateFrame::from_name("SUPERGALACTIC").is_err());
    }

    #[test]
    fn test_require_supported() {
        assert!(CoordinateFrame::require_supported("Icrs").is_ok());
        match CoordinateFrame::require_supported("FK5") {
            Err(DalError::UnsupportedFrame(name)) => assert_eq!(name, "FK5"),
            other => panic!("Expected unsupported frame, got {:?}", other),
        }
    }
}
