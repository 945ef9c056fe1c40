use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Real-valued per-cell quantity (reflectance, proxy, coordinate)
pub type OceanReal = f32;

/// 2D scalar field on a granule's spatial grid (row x column)
pub type Field = Array2<OceanReal>;

/// 3D reflectance cube (row x column x band)
pub type BandCube = Array3<OceanReal>;

/// Band-centre wavelengths in nanometers, one per band of the cube
pub type Wavelengths = Array1<OceanReal>;

/// Navigation grids aligned with a granule's scalar fields
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateGrid {
    pub latitude: Field,
    pub longitude: Field,
}

impl CoordinateGrid {
    /// Build a grid, rejecting latitude/longitude arrays of different shape
    pub fn new(latitude: Field, longitude: Field) -> OceanResult<Self> {
        if latitude.dim() != longitude.dim() {
            return Err(OceanError::ShapeMismatch {
                context: "longitude grid".to_string(),
                expected: latitude.dim(),
                found: longitude.dim(),
            });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.latitude.dim()
    }

    /// Resolve a row-major flat index to (latitude, longitude)
    pub fn lookup(&self, flat_index: usize) -> Option<(f64, f64)> {
        let (_, cols) = self.dim();
        if cols == 0 {
            return None;
        }
        let (row, col) = (flat_index / cols, flat_index % cols);
        let lat = *self.latitude.get((row, col))?;
        let lon = *self.longitude.get((row, col))?;
        Some((lat as f64, lon as f64))
    }
}

/// One time-ordered satellite observation after loading and validation.
///
/// Every derived scalar shares the cube's spatial shape and the
/// coordinate grid's shape. Granules are never mutated after assembly;
/// enrichment goes through [`Granule::with_scalar`], which consumes and
/// returns the granule.
#[derive(Debug, Clone)]
pub struct Granule {
    pub identifier: String,
    pub acquisition_order: usize,
    pub acquired_at: Option<DateTime<Utc>>,
    pub band_cube: BandCube,
    pub wavelengths: Wavelengths,
    pub coordinates: CoordinateGrid,
    pub derived_scalars: BTreeMap<String, Field>,
}

impl Granule {
    /// Spatial (rows, columns) shape shared by every field of the granule
    pub fn spatial_dim(&self) -> (usize, usize) {
        let (rows, cols, _) = self.band_cube.dim();
        (rows, cols)
    }

    pub fn band_count(&self) -> usize {
        self.band_cube.dim().2
    }

    /// Look up a derived scalar field by name
    pub fn scalar(&self, name: &str) -> OceanResult<&Field> {
        self.derived_scalars.get(name).ok_or_else(|| {
            OceanError::InvalidFormat(format!(
                "Granule {} has no scalar field '{}'",
                self.identifier, name
            ))
        })
    }

    /// Attach a derived field, enforcing the spatial shape invariant
    pub fn with_scalar(mut self, name: &str, field: Field) -> OceanResult<Self> {
        if field.dim() != self.spatial_dim() {
            return Err(OceanError::ShapeMismatch {
                context: format!("scalar field '{}' of {}", name, self.identifier),
                expected: self.spatial_dim(),
                found: field.dim(),
            });
        }
        self.derived_scalars.insert(name.to_string(), field);
        Ok(self)
    }
}

/// One spatial cell of one granule, flattened.
///
/// `values` follows the column order of the owning [`FeatureTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub latitude: OceanReal,
    pub longitude: OceanReal,
    pub values: Vec<OceanReal>,
    pub source_granule: Arc<str>,
}

/// Append-only, row-oriented feature table spanning every processed granule
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    /// Scalar column names, in row value order
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full header: coordinates, scalar columns, then the granule tag
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["latitude".to_string(), "longitude".to_string()];
        header.extend(self.columns.iter().cloned());
        header.push("source_granule".to_string());
        header
    }

    /// Concatenate another table with the same schema, preserving order
    pub fn append(&mut self, mut other: FeatureTable) -> OceanResult<()> {
        if other.columns != self.columns {
            return Err(OceanError::InvalidFormat(format!(
                "Cannot append feature table with columns {:?} to table with columns {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.append(&mut other.rows);
        Ok(())
    }

    /// Extract one scalar column across all rows
    pub fn column(&self, name: &str) -> Option<Vec<OceanReal>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }

    /// Rows contributed by a single granule
    pub fn rows_for<'a>(&'a self, granule: &'a str) -> impl Iterator<Item = &'a FeatureRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| &*row.source_granule == granule)
    }
}

/// Which end of the delta distribution a hotspot search ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotSelection {
    /// Highest signed delta (growth)
    #[default]
    Growth,
    /// Most negative delta (decline)
    Decline,
    /// Largest absolute delta
    Magnitude,
}

impl std::fmt::Display for HotspotSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotspotSelection::Growth => write!(f, "growth"),
            HotspotSelection::Decline => write!(f, "decline"),
            HotspotSelection::Magnitude => write!(f, "magnitude"),
        }
    }
}

/// One ranked cell of a granule pair's delta field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotRecord {
    /// 1-based, dense, restarts for every (pair, field)
    pub rank: usize,
    pub row: usize,
    pub column: usize,
    pub flat_index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Signed `current - previous` value
    pub delta_value: f64,
    pub field: String,
    pub from_granule: String,
    pub to_granule: String,
    pub selection: HotspotSelection,
}

/// A granule that could not be loaded or assembled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GranuleFailure {
    pub identifier: String,
    pub acquisition_order: usize,
    pub reason: String,
}

/// A granule pair whose delta could not be computed for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairFailure {
    pub from_granule: String,
    pub to_granule: String,
    pub field: String,
    pub reason: String,
}

/// Finite-value statistics of a derived field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSummary {
    pub finite_count: usize,
    pub total_count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Error types for ocean-colour processing
#[derive(Debug, thiserror::Error)]
pub enum OceanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load granule {granule}: {reason}")]
    GranuleLoad { granule: String, reason: String },

    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OceanError {
    /// Errors that must abort a whole run rather than a single granule
    pub fn is_fatal(&self) -> bool {
        matches!(self, OceanError::Configuration(_))
    }
}

/// Result type for ocean-colour operations
pub type OceanResult<T> = Result<T, OceanError>;
