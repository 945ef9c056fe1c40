//! oceanspot: ocean-colour feature derivation and temporal hotspot detection
//!
//! Takes a time-ordered sequence of L2 ocean-colour granules (reflectance
//! cube, wavelength axis, navigation, precomputed scalar fields), derives an
//! OC4 chlorophyll proxy per cell, flattens every granule into one feature
//! table, and ranks the cells whose tracked field changed most between
//! consecutive granules.
//!
//! Reading physical product files is left to a [`io::GranuleSource`]
//! implementation supplied by the caller.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BandCube, CoordinateGrid, FeatureRow, FeatureTable, Field, FieldSummary, Granule, GranuleFailure,
    HotspotRecord, HotspotSelection, OceanError, OceanResult, PairFailure, Wavelengths,
};

pub use config::{BandMathParams, ExecutionMode, FeatureParams, HotspotParams, PipelineConfig, TieBreak};

pub use io::{GranuleLoader, GranuleSource, MemoryGranuleSource, RawGranule};

pub use crate::core::{
    compute_chlorophyll_proxy, compute_delta, find_decline_hotspots, find_hotspots, find_magnitude_hotspots,
    FeatureAssembler, HotspotFinder, PairLabels, PipelineDriver, PipelineOutput,
};
