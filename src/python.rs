//! Python bindings (`oceanspot._core`)

use crate::config::BandMathParams;
use crate::core::{band_math, hotspots};
use crate::types::{CoordinateGrid, HotspotSelection, OceanError};
use numpy::{PyArray2, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

fn to_py_err(e: OceanError) -> PyErr {
    match e {
        OceanError::Configuration(_) | OceanError::ShapeMismatch { .. } | OceanError::InvalidFormat(_) => {
            PyValueError::new_err(e.to_string())
        }
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// OC4 chlorophyll proxy of an (rows, cols, bands) reflectance cube
#[pyfunction]
#[pyo3(signature = (rrs, wavelengths, coefficients=None, floor=None))]
fn compute_chlorophyll_proxy<'py>(
    py: Python<'py>,
    rrs: PyReadonlyArray3<f32>,
    wavelengths: PyReadonlyArray1<f32>,
    coefficients: Option<Vec<f64>>,
    floor: Option<f64>,
) -> PyResult<&'py PyArray2<f32>> {
    let mut params = BandMathParams::default();
    if let Some(c) = coefficients {
        params.coefficients = <[f64; 5]>::try_from(c)
            .map_err(|c| PyValueError::new_err(format!("Expected 5 coefficients, got {}", c.len())))?;
    }
    if let Some(f) = floor {
        params.reflectance_floor = f;
    }

    let cube = rrs.as_array().to_owned();
    let wl = wavelengths.as_array().to_owned();
    let proxy = band_math::compute_chlorophyll_proxy(&cube, &wl, &params).map_err(to_py_err)?;
    Ok(proxy.to_pyarray(py))
}

/// Ranked hotspots of `current - previous` as a list of dicts
#[pyfunction]
#[pyo3(signature = (previous, current, latitude, longitude, top_k, selection="growth"))]
fn find_hotspots<'py>(
    py: Python<'py>,
    previous: PyReadonlyArray2<f32>,
    current: PyReadonlyArray2<f32>,
    latitude: PyReadonlyArray2<f32>,
    longitude: PyReadonlyArray2<f32>,
    top_k: usize,
    selection: &str,
) -> PyResult<&'py PyList> {
    let previous = previous.as_array().to_owned();
    let current = current.as_array().to_owned();
    let coords = CoordinateGrid::new(latitude.as_array().to_owned(), longitude.as_array().to_owned())
        .map_err(to_py_err)?;

    let selection = match selection.to_lowercase().as_str() {
        "growth" => HotspotSelection::Growth,
        "decline" => HotspotSelection::Decline,
        "magnitude" => HotspotSelection::Magnitude,
        _ => {
            return Err(PyValueError::new_err(format!(
                "Invalid selection: {} (expected growth, decline or magnitude)",
                selection
            )))
        }
    };

    let labels = hotspots::PairLabels {
        field: "delta",
        from_granule: "previous",
        to_granule: "current",
    };
    let records = match selection {
        HotspotSelection::Growth => {
            hotspots::find_hotspots(&previous, &current, &coords, &coords, top_k, labels)
        }
        HotspotSelection::Decline => {
            hotspots::find_decline_hotspots(&previous, &current, &coords, &coords, top_k, labels)
        }
        HotspotSelection::Magnitude => {
            hotspots::find_magnitude_hotspots(&previous, &current, &coords, &coords, top_k, labels)
        }
    }
    .map_err(to_py_err)?;

    let list = PyList::empty(py);
    for record in records {
        let item = PyDict::new(py);
        item.set_item("rank", record.rank)?;
        item.set_item("row", record.row)?;
        item.set_item("column", record.column)?;
        item.set_item("latitude", record.latitude)?;
        item.set_item("longitude", record.longitude)?;
        item.set_item("delta_value", record.delta_value)?;
        item.set_item("selection", record.selection.to_string())?;
        list.append(item)?;
    }
    Ok(list)
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compute_chlorophyll_proxy, m)?)?;
    m.add_function(wrap_pyfunction!(find_hotspots, m)?)?;
    Ok(())
}
