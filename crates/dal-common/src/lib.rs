//! Common types and utilities shared across the DAL query crates.

pub mod error;
pub mod frame;
pub mod sky;
pub mod time;

pub use error::{DalError, DalResult};
pub use frame::CoordinateFrame;
pub use sky::{angular_distance, recenter_longitude, SkyBox};
pub use time::{parse_iso_date, DateParseError};
