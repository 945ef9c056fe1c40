use crate::types::{
    BandCube, CoordinateGrid, Field, Granule, OceanError, OceanReal, OceanResult, Wavelengths,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ndarray::{ArrayD, Axis, Ix2};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// Granule contents as handed over by a product reader, before validation.
///
/// Navigation arrays may carry an extra trailing axis (per-scan sub-pixel
/// samples); the loader averages it away.
#[derive(Debug, Clone)]
pub struct RawGranule {
    pub identifier: String,
    pub band_cube: BandCube,
    pub wavelengths: Wavelengths,
    pub latitude: ArrayD<OceanReal>,
    pub longitude: ArrayD<OceanReal>,
    pub scalars: BTreeMap<String, Field>,
}

/// Anything that can produce raw granule arrays for an identifier.
///
/// Implementations read physical products; malformed pixels should come
/// back as NaN, and only whole-granule problems as errors.
pub trait GranuleSource {
    fn read(&self, identifier: &str) -> OceanResult<RawGranule>;
}

impl<F> GranuleSource for F
where
    F: Fn(&str) -> OceanResult<RawGranule>,
{
    fn read(&self, identifier: &str) -> OceanResult<RawGranule> {
        self(identifier)
    }
}

/// In-memory granule source, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct MemoryGranuleSource {
    granules: HashMap<String, RawGranule>,
}

impl MemoryGranuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, granule: RawGranule) {
        self.granules.insert(granule.identifier.clone(), granule);
    }

    pub fn len(&self) -> usize {
        self.granules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.granules.is_empty()
    }
}

impl GranuleSource for MemoryGranuleSource {
    fn read(&self, identifier: &str) -> OceanResult<RawGranule> {
        self.granules
            .get(identifier)
            .cloned()
            .ok_or_else(|| OceanError::GranuleLoad {
                granule: identifier.to_string(),
                reason: "not present in source".to_string(),
            })
    }
}

/// Validates raw granule arrays and turns them into [`Granule`]s
#[derive(Debug, Clone)]
pub struct GranuleLoader {
    required_fields: Vec<String>,
    timestamp_pattern: Regex,
}

impl GranuleLoader {
    /// Create a loader that insists on the given precomputed scalar fields
    pub fn new(required_fields: Vec<String>) -> OceanResult<Self> {
        let timestamp_pattern = Regex::new(r"(\d{8}T\d{6})")
            .map_err(|e| OceanError::Configuration(format!("Regex error: {}", e)))?;
        Ok(Self {
            required_fields,
            timestamp_pattern,
        })
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    /// Read a granule from `source` and validate it
    pub fn load<S>(&self, source: &S, identifier: &str, acquisition_order: usize) -> OceanResult<Granule>
    where
        S: GranuleSource + ?Sized,
    {
        log::info!("Loading granule {} (#{})", identifier, acquisition_order);
        let raw = source.read(identifier).map_err(|e| match e {
            OceanError::GranuleLoad { .. } => e,
            other => load_error(identifier, other.to_string()),
        })?;
        self.assemble(raw, acquisition_order)
    }

    /// Check shape invariants, reduce navigation, and attach the acquisition time
    pub fn assemble(&self, raw: RawGranule, acquisition_order: usize) -> OceanResult<Granule> {
        let RawGranule {
            identifier,
            band_cube,
            wavelengths,
            latitude,
            longitude,
            scalars,
        } = raw;

        let (rows, cols, bands) = band_cube.dim();
        log::debug!("Granule {}: {}x{} cells, {} bands", identifier, rows, cols, bands);

        if wavelengths.len() != bands {
            return Err(load_error(
                &identifier,
                format!(
                    "wavelength axis has {} entries but cube has {} bands",
                    wavelengths.len(),
                    bands
                ),
            ));
        }

        for (name, field) in &scalars {
            if field.dim() != (rows, cols) {
                return Err(load_error(
                    &identifier,
                    format!(
                        "scalar field '{}' is {:?}, expected {:?}",
                        name,
                        field.dim(),
                        (rows, cols)
                    ),
                ));
            }
        }

        if let Some(missing) = self.required_fields.iter().find(|f| !scalars.contains_key(*f)) {
            return Err(load_error(
                &identifier,
                format!("required scalar field '{}' is missing", missing),
            ));
        }

        let latitude = reduce_navigation(latitude, (rows, cols))
            .map_err(|reason| load_error(&identifier, format!("latitude: {}", reason)))?;
        let longitude = reduce_navigation(longitude, (rows, cols))
            .map_err(|reason| load_error(&identifier, format!("longitude: {}", reason)))?;
        let coordinates = CoordinateGrid::new(latitude, longitude)
            .map_err(|e| load_error(&identifier, e.to_string()))?;

        let acquired_at = self.parse_acquisition_time(&identifier);
        if acquired_at.is_none() {
            log::debug!("No acquisition timestamp in identifier {}", identifier);
        }

        Ok(Granule {
            identifier,
            acquisition_order,
            acquired_at,
            band_cube,
            wavelengths,
            coordinates,
            derived_scalars: scalars,
        })
    }

    /// First `YYYYMMDDTHHMMSS` token of an identifier, as UTC
    pub fn parse_acquisition_time(&self, identifier: &str) -> Option<DateTime<Utc>> {
        let captures = self.timestamp_pattern.captures(identifier)?;
        let naive = NaiveDateTime::parse_from_str(&captures[1], "%Y%m%dT%H%M%S").ok()?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

fn load_error(identifier: &str, reason: String) -> OceanError {
    OceanError::GranuleLoad {
        granule: identifier.to_string(),
        reason,
    }
}

/// Bring a navigation array onto the scalar-field grid.
///
/// A 2D array must already match; a 3D array whose leading axes match is
/// averaged over its trailing axis. NaN samples propagate into the mean.
pub fn reduce_navigation(nav: ArrayD<OceanReal>, spatial: (usize, usize)) -> Result<Field, String> {
    match nav.ndim() {
        2 => {
            let grid = nav
                .into_dimensionality::<Ix2>()
                .map_err(|e| format!("cannot view as 2D: {}", e))?;
            if grid.dim() != spatial {
                return Err(format!("grid is {:?}, expected {:?}", grid.dim(), spatial));
            }
            Ok(grid)
        }
        3 => {
            let shape = nav.shape().to_vec();
            if (shape[0], shape[1]) != spatial {
                return Err(format!("grid is {:?}, expected {:?} plus a trailing axis", shape, spatial));
            }
            let mean = nav
                .mean_axis(Axis(2))
                .ok_or_else(|| "trailing axis is empty".to_string())?;
            mean.into_dimensionality::<Ix2>()
                .map_err(|e| format!("cannot view as 2D: {}", e))
        }
        n => Err(format!("unsupported {}-dimensional navigation array", n)),
    }
}
