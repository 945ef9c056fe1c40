//! Granule intake and output adapters

pub mod granule_loader;
pub mod export;

pub use granule_loader::{GranuleLoader, GranuleSource, MemoryGranuleSource, RawGranule};
pub use export::{hotspots_to_geojson, write_feature_table_csv, write_hotspot_geojson};
