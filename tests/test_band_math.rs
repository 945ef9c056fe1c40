use approx::assert_relative_eq;
use ndarray::Array3;
use oceanspot::core::band_math::{nearest_band, oc4_cell, select_oc4_bands};
use oceanspot::{compute_chlorophyll_proxy, BandMathParams, OceanError, Wavelengths};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic reflectance-like values in [0, 0.02)
fn pseudo_reflectance(seed: &mut u64) -> f32 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    ((*seed >> 33) as f32 / (1u64 << 31) as f32) * 0.02
}

fn pace_like_wavelengths() -> Wavelengths {
    Wavelengths::from(vec![410.0, 440.0, 490.0, 510.0, 555.0, 670.0])
}

#[test]
fn test_nearest_wavelength_scenario() {
    let wl = pace_like_wavelengths();
    // 443 nm sits 3 nm from 440 and 47 nm from 490
    assert_eq!(nearest_band(&wl, 443.0), Some(1));

    let bands = select_oc4_bands(&wl, &[443.0, 490.0, 510.0, 555.0]).unwrap();
    assert_eq!(bands.blue, [1, 2, 3]);
    assert_eq!(bands.green, 4);
}

#[test]
fn test_proxy_finite_and_non_negative() {
    init_logging();

    let params = BandMathParams::default();
    let mut seed = 42u64;
    let cube = Array3::from_shape_fn((16, 12, 6), |_| pseudo_reflectance(&mut seed));

    let proxy = compute_chlorophyll_proxy(&cube, &pace_like_wavelengths(), &params).unwrap();
    assert_eq!(proxy.dim(), (16, 12));
    for &value in proxy.iter() {
        assert!(value.is_finite(), "non-finite proxy {}", value);
        assert!(value >= 0.0);
    }
}

#[test]
fn test_nan_band_only_affects_its_cells() {
    init_logging();

    let params = BandMathParams::default();
    let mut seed = 7u64;
    let cube = Array3::from_shape_fn((4, 5, 6), |_| 0.001 + pseudo_reflectance(&mut seed));
    let reference = compute_chlorophyll_proxy(&cube, &pace_like_wavelengths(), &params).unwrap();

    // Knock out the 555 nm band in a single row
    let mut damaged = cube.clone();
    for c in 0..5 {
        damaged[[2, c, 4]] = f32::NAN;
    }
    let proxy = compute_chlorophyll_proxy(&damaged, &pace_like_wavelengths(), &params).unwrap();

    for ((r, c), &value) in proxy.indexed_iter() {
        if r == 2 {
            assert!(value.is_nan());
        } else {
            assert_eq!(value, reference[[r, c]]);
        }
    }
}

#[test]
fn test_all_nan_target_band() {
    let params = BandMathParams::default();
    let mut cube = Array3::<f32>::from_elem((3, 3, 6), 0.005);
    for r in 0..3 {
        for c in 0..3 {
            cube[[r, c, 2]] = f32::NAN;
        }
    }
    let proxy = compute_chlorophyll_proxy(&cube, &pace_like_wavelengths(), &params).unwrap();
    assert!(proxy.iter().all(|v| v.is_nan()));
}

#[test]
fn test_known_ratio() {
    let params = BandMathParams::default();
    // Blue maximum 0.02 over green 0.01 gives ratio 2
    let value = oc4_cell(0.01, 0.02, 0.015, 0.01, &params.coefficients, params.reflectance_floor);

    let x = 2f64.log10();
    let [a0, a1, a2, a3, a4] = params.coefficients;
    let expected = 10f64.powf(a0 + a1 * x + a2 * x * x + a3 * x.powi(3) + a4 * x.powi(4));
    assert_relative_eq!(value as f64, expected, max_relative = 1e-5);
}

#[test]
fn test_custom_coefficients() {
    let params = BandMathParams {
        coefficients: [1.0, 0.0, 0.0, 0.0, 0.0],
        ..BandMathParams::default()
    };
    let cube = Array3::<f32>::from_elem((2, 2, 6), 0.004);
    let proxy = compute_chlorophyll_proxy(&cube, &pace_like_wavelengths(), &params).unwrap();
    assert_relative_eq!(proxy[[1, 1]], 10.0, max_relative = 1e-6);
}

#[test]
fn test_three_band_sensor_is_configuration_error() {
    let params = BandMathParams::default();
    let cube = Array3::<f32>::zeros((2, 2, 3));
    let wl = Wavelengths::from(vec![443.0, 490.0, 555.0]);

    let result = compute_chlorophyll_proxy(&cube, &wl, &params);
    assert!(matches!(result, Err(OceanError::Configuration(_))));
}
