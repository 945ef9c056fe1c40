//! Core ocean-colour processing modules

pub mod band_math;
pub mod features;
pub mod hotspots;
pub mod pipeline;

// Re-export main types and functions
pub use band_math::{compute_chlorophyll_proxy, nearest_band, select_oc4_bands, summarize_field, Oc4Bands};
pub use features::FeatureAssembler;
pub use hotspots::{
    compute_delta, find_decline_hotspots, find_hotspots, find_magnitude_hotspots, HotspotFinder, PairLabels,
};
pub use pipeline::{GranuleOutcome, GranuleSummary, PipelineDriver, PipelineOutput};
