use crate::types::{FeatureTable, HotspotRecord, OceanResult};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the feature table as CSV with a `latitude,longitude,<fields>,source_granule` header.
///
/// NaN cells are written as `NaN`.
pub fn write_feature_table_csv<P: AsRef<Path>>(table: &FeatureTable, path: P) -> OceanResult<()> {
    let path = path.as_ref();
    log::info!("Writing {} feature rows to {}", table.len(), path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.header())?;

    let mut record: Vec<String> = Vec::with_capacity(table.columns.len() + 3);
    for row in &table.rows {
        record.clear();
        record.push(row.latitude.to_string());
        record.push(row.longitude.to_string());
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.push(row.source_granule.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// GeoJSON FeatureCollection of hotspot points.
///
/// Geometry is `[longitude, latitude]`; every other record attribute goes
/// into `properties`.
pub fn hotspots_to_geojson(records: &[HotspotRecord]) -> OceanResult<Value> {
    let features = records
        .iter()
        .map(|record| -> OceanResult<Value> {
            let mut properties = serde_json::to_value(record)?;
            if let Value::Object(map) = &mut properties {
                map.remove("latitude");
                map.remove("longitude");
            }
            Ok(json!({
                "type": "Feature",
                "properties": properties,
                "geometry": {
                    "type": "Point",
                    "coordinates": [record.longitude, record.latitude],
                },
            }))
        })
        .collect::<OceanResult<Vec<Value>>>()?;

    Ok(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

/// Write hotspots as a pretty-printed GeoJSON file
pub fn write_hotspot_geojson<P: AsRef<Path>>(records: &[HotspotRecord], path: P) -> OceanResult<()> {
    let path = path.as_ref();
    log::info!("Writing {} hotspots to {}", records.len(), path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let collection = hotspots_to_geojson(records)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}
