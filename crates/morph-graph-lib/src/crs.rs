//! Coordinate reference systems and reprojection of tables

use crate::{GeoTable, MorphError, Result, utils};
use geo::MapCoords;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinate reference system of a [`GeoTable`]
///
/// Only WGS84 and Web Mercator can be converted into each other; any other projected
/// system is carried as an opaque identifier and must already match between inputs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Crs {
    /// EPSG:4326, x = longitude, y = latitude in degrees
    Wgs84,
    /// EPSG:3857, meters
    WebMercator,
    /// Any other system, identified by its authority string (e.g. "EPSG:27700")
    Other(String),
}

impl FromStr for Crs {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "" => Err(MorphError::InvalidCrs(s.to_string())),
            "EPSG:4326" | "WGS84" | "OGC:CRS84" => Ok(Crs::Wgs84),
            "EPSG:3857" | "EPSG:900913" => Ok(Crs::WebMercator),
            _ => Ok(Crs::Other(normalized)),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::Other(id) => write!(f, "{id}"),
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeoTable {
    /// Reproject every geometry of the table into `target`
    ///
    /// Tables without a CRS cannot be reprojected and are returned with the target CRS
    /// assigned unchanged. Returns an error for unsupported system pairs.
    pub fn to_crs(&self, target: &Crs) -> Result<GeoTable> {
        let Some(source) = self.crs() else {
            tracing::warn!("Table has no CRS; assigning {} without reprojection", target);
            return Ok(self.clone().with_crs(Some(target.clone())));
        };
        if source == target {
            return Ok(self.clone());
        }

        let convert: fn(geo::Coord<f64>) -> geo::Coord<f64> = match (source, target) {
            (Crs::Wgs84, Crs::WebMercator) => utils::wgs84_to_mercator,
            (Crs::WebMercator, Crs::Wgs84) => utils::mercator_to_wgs84,
            _ => {
                return Err(MorphError::UnsupportedReprojection {
                    from: source.clone(),
                    to: target.clone(),
                });
            }
        };

        tracing::debug!("Reprojecting {} rows from {} to {}", self.len(), source, target);
        Ok(self
            .map_geometries(|g| g.map_coords(convert))
            .with_crs(Some(target.clone())))
    }
}
