use crate::config::BandMathParams;
use crate::types::{BandCube, Field, FieldSummary, OceanError, OceanResult, Wavelengths};
use ndarray::{Array2, ArrayView2, Axis, Zip};
use num_traits::Float;

/// Minimum number of bands an OC4 estimate needs
const OC4_BAND_COUNT: usize = 4;

/// Band indices resolved for the OC4 band ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oc4Bands {
    pub blue: [usize; 3],
    pub green: usize,
}

/// Index of the band whose wavelength is closest to `target_nm`.
///
/// Ties resolve to the lower index. Non-finite wavelengths never match.
pub fn nearest_band(wavelengths: &Wavelengths, target_nm: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &wl) in wavelengths.iter().enumerate() {
        if !wl.is_finite() {
            continue;
        }
        let distance = (wl - target_nm).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Resolve the four OC4 target wavelengths to distinct band indices
pub fn select_oc4_bands(wavelengths: &Wavelengths, targets: &[f32; 4]) -> OceanResult<Oc4Bands> {
    if wavelengths.len() < OC4_BAND_COUNT {
        return Err(OceanError::Configuration(format!(
            "OC4 needs at least {} bands, granule has {}",
            OC4_BAND_COUNT,
            wavelengths.len()
        )));
    }

    let mut indices = [0usize; 4];
    for (slot, &target) in indices.iter_mut().zip(targets.iter()) {
        *slot = nearest_band(wavelengths, target).ok_or_else(|| {
            OceanError::Configuration(format!("No finite wavelength to match {} nm", target))
        })?;
    }

    for i in 0..OC4_BAND_COUNT {
        if indices[..i].contains(&indices[i]) {
            return Err(OceanError::Configuration(format!(
                "Target wavelengths {:?} resolve to bands {:?}; fewer than {} distinct bands",
                targets, indices, OC4_BAND_COUNT
            )));
        }
    }

    log::debug!(
        "OC4 bands: {:?} nm -> indices {:?} ({:?} nm)",
        targets,
        indices,
        indices.iter().map(|&i| wavelengths[i]).collect::<Vec<_>>()
    );

    Ok(Oc4Bands {
        blue: [indices[0], indices[1], indices[2]],
        green: indices[3],
    })
}

/// Horner evaluation of `c[0] + c[1] x + c[2] x^2 + ...`
pub fn evaluate_polynomial<T: Float>(coefficients: &[T], x: T) -> T {
    coefficients
        .iter()
        .rev()
        .fold(T::zero(), |acc, &c| acc * x + c)
}

/// OC4 chlorophyll proxy for a single cell.
///
/// NaN in any of the four reflectances yields NaN. Reflectances and the
/// ratio are clipped to `floor` so neither the division nor the logarithm
/// can go non-finite.
pub fn oc4_cell(r443: f32, r490: f32, r510: f32, r555: f32, coefficients: &[f64; 5], floor: f64) -> f32 {
    if r443.is_nan() || r490.is_nan() || r510.is_nan() || r555.is_nan() {
        return f32::NAN;
    }

    let blue = (r443 as f64).max(r490 as f64).max(r510 as f64).max(floor);
    let green = (r555 as f64).max(floor);
    let log_r = (blue / green).max(floor).log10();

    10f64.powf(evaluate_polynomial(coefficients, log_r)) as f32
}

/// Compute the OC4 chlorophyll proxy over a reflectance cube.
///
/// The output has the cube's spatial shape. Cells are independent of each
/// other; a missing reflectance only affects its own cell.
pub fn compute_chlorophyll_proxy(
    band_cube: &BandCube,
    wavelengths: &Wavelengths,
    params: &BandMathParams,
) -> OceanResult<Field> {
    let (rows, cols, bands) = band_cube.dim();
    if wavelengths.len() != bands {
        return Err(OceanError::InvalidFormat(format!(
            "Wavelength axis has {} entries but cube has {} bands",
            wavelengths.len(),
            bands
        )));
    }

    let selected = select_oc4_bands(wavelengths, &params.target_wavelengths)?;
    log::debug!("Computing OC4 proxy on {}x{} grid", rows, cols);

    let r443: ArrayView2<f32> = band_cube.index_axis(Axis(2), selected.blue[0]);
    let r490 = band_cube.index_axis(Axis(2), selected.blue[1]);
    let r510 = band_cube.index_axis(Axis(2), selected.blue[2]);
    let r555 = band_cube.index_axis(Axis(2), selected.green);

    let coefficients = &params.coefficients;
    let floor = params.reflectance_floor;
    let mut proxy = Array2::<f32>::zeros((rows, cols));

    let zip = Zip::from(&mut proxy)
        .and(&r443)
        .and(&r490)
        .and(&r510)
        .and(&r555);

    #[cfg(feature = "parallel")]
    zip.par_for_each(|out, &a, &b, &c, &d| {
        *out = oc4_cell(a, b, c, d, coefficients, floor);
    });

    #[cfg(not(feature = "parallel"))]
    zip.for_each(|out, &a, &b, &c, &d| {
        *out = oc4_cell(a, b, c, d, coefficients, floor);
    });

    Ok(proxy)
}

/// Finite-value statistics for a field; NaN and infinite cells are skipped
pub fn summarize_field(field: &Field) -> FieldSummary {
    let mut finite_count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for &value in field.iter() {
        if !value.is_finite() {
            continue;
        }
        let v = value as f64;
        finite_count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if finite_count == 0 {
        return FieldSummary {
            finite_count,
            total_count: field.len(),
            mean: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        };
    }

    FieldSummary {
        finite_count,
        total_count: field.len(),
        mean: sum / finite_count as f64,
        min,
        max,
    }
}
