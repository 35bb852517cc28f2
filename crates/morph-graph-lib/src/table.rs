//! Tabular geometry collections
//!
//! A [`GeoTable`] is a primary geometry column plus any number of named attribute
//! columns and an optional coordinate reference system. Every operation in this crate
//! consumes tables by reference and returns new tables; inputs are never mutated.

use crate::{Crs, MorphError, Result};
use geo::Geometry;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the primary geometry column
pub const GEOMETRY_COLUMN: &str = "geometry";

/// A single attribute value
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Alternate geometry stored as an attribute (e.g. barrier geometry)
    Geometry(Geometry<f64>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Hashable key used to compare identifiers
    ///
    /// Floats are compared bitwise; geometries and nulls are not valid identifiers.
    pub(crate) fn id_key(&self) -> Option<IdKey> {
        match self {
            Value::Bool(v) => Some(IdKey::Bool(*v)),
            Value::Int(v) => Some(IdKey::Int(*v)),
            Value::Float(v) => Some(IdKey::Float(v.to_bits())),
            Value::Text(v) => Some(IdKey::Text(v.clone())),
            Value::Null | Value::Geometry(_) => None,
        }
    }
}

/// Identifier key derived from a [`Value`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum IdKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Geometry<f64>> for Value {
    fn from(v: Geometry<f64>) -> Self {
        Value::Geometry(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Geometry(_) => write!(f, "<geometry>"),
        }
    }
}

/// A named attribute column
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Tabular geometry collection
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoTable {
    /// Primary geometry, one entry per row
    geometry: Vec<Geometry<f64>>,
    /// Attribute columns, each with exactly one value per row
    columns: Vec<Column>,
    /// Coordinate reference system shared by all geometries
    crs: Option<Crs>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeoTable {
    /// Create a table without attributes or CRS
    pub fn new(geometry: Vec<Geometry<f64>>) -> Self {
        Self {
            geometry,
            columns: Vec::new(),
            crs: None,
        }
    }

    /// Set the coordinate reference system (no reprojection is performed)
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Add or replace a column
    ///
    /// Returns an error if the number of values does not match the number of rows.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Result<Self> {
        self.set_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a column in place
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.geometry.len() {
            return Err(MorphError::ColumnLength {
                column: name.to_string(),
                expected: self.geometry.len(),
                actual: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Remove a column if present
    pub fn drop_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c.name != name);
        self
    }

    /// Number of rows
    #[inline]
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    /// Check if the table has no rows
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    #[inline]
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Primary geometry of every row
    #[inline]
    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometry
    }

    #[inline]
    pub fn geometry(&self, row: usize) -> Option<&Geometry<f64>> {
        self.geometry.get(row)
    }

    /// Values of a column, or `None` if the column does not exist
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// All attribute columns in insertion order
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Value at (row, column)
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|values| values.get(row))
    }

    /// Select rows by position, preserving the given order
    pub fn take(&self, rows: &[usize]) -> GeoTable {
        let rows: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&r| r < self.geometry.len())
            .collect();
        GeoTable {
            geometry: rows.iter().map(|&r| self.geometry[r].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&r| c.values[r].clone()).collect(),
                })
                .collect(),
            crs: self.crs.clone(),
        }
    }

    /// Empty table with the same columns and CRS
    pub fn empty_like(&self) -> GeoTable {
        self.take(&[])
    }

    /// Per-row geometry taken from an alternate geometry column
    ///
    /// Null entries fall back to the primary geometry of the row. Returns `None` if the
    /// column does not exist, names the primary geometry, or contains non-geometry values.
    pub fn alternate_geometries(&self, name: &str) -> Option<Vec<&Geometry<f64>>> {
        if name == GEOMETRY_COLUMN {
            return None;
        }
        let values = self.column(name)?;
        values
            .iter()
            .zip(&self.geometry)
            .map(|(value, primary)| match value {
                Value::Geometry(g) => Some(g),
                Value::Null => Some(primary),
                _ => None,
            })
            .collect()
    }

    /// Map every geometry (primary and geometry-valued attributes) through `f`
    pub(crate) fn map_geometries<F>(&self, f: F) -> GeoTable
    where
        F: Fn(&Geometry<f64>) -> Geometry<f64>,
    {
        GeoTable {
            geometry: self.geometry.iter().map(&f).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c
                        .values
                        .iter()
                        .map(|v| match v {
                            Value::Geometry(g) => Value::Geometry(f(g)),
                            other => other.clone(),
                        })
                        .collect(),
                })
                .collect(),
            crs: self.crs.clone(),
        }
    }

    /// Ensure every geometry is a polygon or multipolygon
    pub fn ensure_polygonal(&self, what: &str) -> Result<()> {
        self.ensure_kind(what, "polygonal", |g| {
            matches!(
                g,
                Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
            )
        })
    }

    /// Ensure every geometry is a line, linestring or multilinestring
    pub fn ensure_linear(&self, what: &str) -> Result<()> {
        self.ensure_kind(what, "linear", |g| {
            matches!(
                g,
                Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_)
            )
        })
    }

    fn ensure_kind(
        &self,
        what: &str,
        kind: &str,
        accepts: impl Fn(&Geometry<f64>) -> bool,
    ) -> Result<()> {
        match self.geometry.iter().position(|g| !accepts(g)) {
            Some(row) => Err(MorphError::InvalidInput(format!(
                "{what} must contain {kind} geometries (row {row} does not)"
            ))),
            None => Ok(()),
        }
    }
}
