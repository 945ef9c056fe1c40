//! Run configuration: band-math constants, hotspot selection and table schema
//!
//! Every section has a `Default` carrying the standard OC4 setup. When a
//! configuration is read from a JSON document, the field lists that decide
//! what the run produces (`hotspots.delta_fields`, `features.fields`) must be
//! present; everything else falls back to the defaults.

use crate::types::{HotspotSelection, OceanError, OceanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Column names the feature table reserves for itself
const RESERVED_COLUMNS: [&str; 3] = ["latitude", "longitude", "source_granule"];

/// OC4 band-ratio parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandMathParams {
    /// Blue numerator bands followed by the green denominator band (nm)
    pub target_wavelengths: [f32; 4],
    /// Polynomial coefficients a0..a4 in log10(ratio)
    pub coefficients: [f64; 5],
    /// Lower clip for reflectances and the band ratio
    pub reflectance_floor: f64,
    /// Name under which the proxy is stored among the derived scalars
    pub proxy_field: String,
}

impl Default for BandMathParams {
    fn default() -> Self {
        Self {
            target_wavelengths: [443.0, 490.0, 510.0, 555.0],
            coefficients: [0.3272, -2.9940, 2.7218, -1.2259, -0.5683],
            reflectance_floor: 1e-6,
            proxy_field: "oc4".to_string(),
        }
    }
}

/// Deterministic ordering among cells with equal scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    FlatIndexAscending,
    FlatIndexDescending,
}

/// Hotspot search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotParams {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub selection: HotspotSelection,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Scalar fields whose granule-to-granule delta is ranked
    pub delta_fields: Vec<String>,
}

fn default_top_k() -> usize {
    20
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            selection: HotspotSelection::Growth,
            tie_break: TieBreak::FlatIndexAscending,
            delta_fields: vec!["nflh".to_string()],
        }
    }
}

/// Feature table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    /// Scalar columns, in output order
    pub fields: Vec<String>,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            fields: vec!["nflh".to_string(), "avw".to_string(), "oc4".to_string()],
        }
    }
}

/// How granules are loaded and enriched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One granule at a time
    #[default]
    Sequential,
    /// Load and enrich `batch_size` granules concurrently, fold in order
    Parallel { batch_size: usize },
}

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub band_math: BandMathParams,
    pub hotspots: HotspotParams,
    pub features: FeatureParams,
    #[serde(default)]
    pub execution: ExecutionMode,
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> OceanResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| OceanError::Configuration(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> OceanResult<Self> {
        let path = path.as_ref();
        log::info!("Loading pipeline configuration from {}", path.display());

        if !path.exists() {
            return Err(OceanError::Configuration(format!(
                "Config not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> OceanResult<()> {
        let bm = &self.band_math;

        for (i, a) in bm.target_wavelengths.iter().enumerate() {
            if !a.is_finite() {
                return Err(OceanError::Configuration(format!(
                    "Target wavelength {} is not finite",
                    i
                )));
            }
            if bm.target_wavelengths[..i].contains(a) {
                return Err(OceanError::Configuration(format!(
                    "Target wavelengths must be distinct, {} nm repeats",
                    a
                )));
            }
        }

        if bm.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(OceanError::Configuration(
                "Polynomial coefficients must be finite".to_string(),
            ));
        }

        if !(bm.reflectance_floor.is_finite() && bm.reflectance_floor > 0.0) {
            return Err(OceanError::Configuration(format!(
                "Reflectance floor must be positive, got {}",
                bm.reflectance_floor
            )));
        }

        if bm.proxy_field.is_empty() {
            return Err(OceanError::Configuration(
                "Proxy field name must not be empty".to_string(),
            ));
        }

        if self.hotspots.top_k == 0 {
            return Err(OceanError::Configuration(
                "top_k must be at least 1".to_string(),
            ));
        }

        if self.hotspots.delta_fields.is_empty() {
            return Err(OceanError::Configuration(
                "At least one delta field is required".to_string(),
            ));
        }

        if self.features.fields.is_empty() {
            return Err(OceanError::Configuration(
                "At least one feature field is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.features.fields {
            if RESERVED_COLUMNS.contains(&field.as_str()) {
                return Err(OceanError::Configuration(format!(
                    "Feature field '{}' collides with a reserved column",
                    field
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(OceanError::Configuration(format!(
                    "Feature field '{}' listed twice",
                    field
                )));
            }
        }

        if let ExecutionMode::Parallel { batch_size: 0 } = self.execution {
            return Err(OceanError::Configuration(
                "Parallel batch size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Scalar fields a granule source must supply (everything the run
    /// reads except the proxy, which band math derives)
    pub fn required_source_fields(&self) -> Vec<String> {
        let mut required: Vec<String> = Vec::new();
        for name in self
            .features
            .fields
            .iter()
            .chain(self.hotspots.delta_fields.iter())
        {
            if *name != self.band_math.proxy_field && !required.contains(name) {
                required.push(name.clone());
            }
        }
        required
    }
}
