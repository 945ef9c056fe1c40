use oceanspot::io::{write_feature_table_csv, write_hotspot_geojson};
use oceanspot::{ExecutionMode, HotspotSelection, MemoryGranuleSource, OceanError, PipelineConfig, PipelineDriver, TieBreak};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.json");
    fs::write(
        &path,
        r#"{
            "band_math": { "reflectance_floor": 1e-5 },
            "hotspots": {
                "top_k": 5,
                "selection": "magnitude",
                "tie_break": "flat_index_descending",
                "delta_fields": ["nflh", "oc4"]
            },
            "features": { "fields": ["oc4", "nflh"] },
            "execution": { "mode": "parallel", "batch_size": 4 }
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    assert_eq!(config.band_math.reflectance_floor, 1e-5);
    assert_eq!(config.band_math.target_wavelengths, [443.0, 490.0, 510.0, 555.0]);
    assert_eq!(config.hotspots.top_k, 5);
    assert_eq!(config.hotspots.selection, HotspotSelection::Magnitude);
    assert_eq!(config.hotspots.tie_break, TieBreak::FlatIndexDescending);
    assert_eq!(config.execution, ExecutionMode::Parallel { batch_size: 4 });
    assert_eq!(config.required_source_fields(), vec!["nflh"]);
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let result = PipelineConfig::from_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(OceanError::Configuration(_))));
}

#[test]
fn test_config_without_delta_fields_is_rejected() {
    let result = PipelineConfig::from_json_str(r#"{ "features": { "fields": ["nflh"] }, "hotspots": {} }"#);
    assert!(matches!(result, Err(OceanError::Configuration(_))));
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let result = PipelineConfig::from_json_str(
        r#"{
            "hotspots": { "delta_fields": ["nflh"] },
            "features": { "fields": ["nflh"] },
            "execution": { "mode": "parallel", "batch_size": 0 }
        }"#,
    );
    assert!(matches!(result, Err(OceanError::Configuration(_))));
}

#[test]
fn test_empty_run_exports() {
    let dir = TempDir::new().unwrap();
    let driver = PipelineDriver::new(PipelineConfig::default()).unwrap();
    let output = driver.run(&MemoryGranuleSource::new(), &[] as &[&str]).unwrap();

    let csv_path = dir.path().join("features.csv");
    let geojson_path = dir.path().join("hotspots.geojson");
    write_feature_table_csv(&output.features, &csv_path).unwrap();
    write_hotspot_geojson(&output.hotspots, &geojson_path).unwrap();

    assert_eq!(
        fs::read_to_string(&csv_path).unwrap().trim_end(),
        "latitude,longitude,nflh,avw,oc4,source_granule"
    );
    let collection: serde_json::Value = serde_json::from_str(&fs::read_to_string(&geojson_path).unwrap()).unwrap();
    assert_eq!(collection["features"].as_array().unwrap().len(), 0);
}
