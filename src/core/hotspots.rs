//! Temporal delta fields and hotspot ranking
//!
//! Both fields of a pair are assumed co-registered: cell `(r, c)` of the
//! previous field and of the current field cover the same footprint.
//! Re-gridding is the caller's job; a shape mismatch is reported, never
//! truncated or broadcast.

use crate::config::{HotspotParams, TieBreak};
use crate::types::{CoordinateGrid, Field, HotspotRecord, HotspotSelection, OceanError, OceanResult};
use std::cmp::Ordering;

/// Granule-pair labels carried into every record
#[derive(Debug, Clone, Copy)]
pub struct PairLabels<'a> {
    pub field: &'a str,
    pub from_granule: &'a str,
    pub to_granule: &'a str,
}

fn check_pair_shape(previous: &Field, current: &Field) -> OceanResult<()> {
    if previous.dim() != current.dim() {
        return Err(OceanError::ShapeMismatch {
            context: "delta field".to_string(),
            expected: previous.dim(),
            found: current.dim(),
        });
    }
    Ok(())
}

/// Element-wise `current - previous`; NaN at either input gives NaN.
///
/// The result is f32, so differences beyond the f32 range come out
/// infinite. Hotspot ranking does its own differencing in f64.
pub fn compute_delta(previous: &Field, current: &Field) -> OceanResult<Field> {
    check_pair_shape(previous, current)?;
    Ok(current - previous)
}

fn cell_delta(previous: f32, current: f32) -> f64 {
    current as f64 - previous as f64
}

/// Cells with a finite delta scored for `selection`, as (flat index, score)
fn candidates(previous: &Field, current: &Field, selection: HotspotSelection) -> Vec<(usize, f64)> {
    previous
        .iter()
        .zip(current.iter())
        .map(|(&p, &c)| cell_delta(p, c))
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(idx, v)| {
            let score = match selection {
                HotspotSelection::Growth => v,
                HotspotSelection::Decline => -v,
                HotspotSelection::Magnitude => v.abs(),
            };
            (idx, score)
        })
        .collect()
}

/// Flat indices of the `top_k` best-scoring candidates, best first.
///
/// Scores are finite, so the comparator is a total order and the result
/// does not depend on the partition strategy.
pub fn rank_candidates(mut scored: Vec<(usize, f64)>, top_k: usize, tie_break: TieBreak) -> Vec<(usize, f64)> {
    let order = |a: &(usize, f64), b: &(usize, f64)| -> Ordering {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| match tie_break {
                TieBreak::FlatIndexAscending => a.0.cmp(&b.0),
                TieBreak::FlatIndexDescending => b.0.cmp(&a.0),
            })
    };

    if top_k == 0 {
        return Vec::new();
    }
    if top_k < scored.len() {
        scored.select_nth_unstable_by(top_k - 1, &order);
        scored.truncate(top_k);
    }
    scored.sort_unstable_by(&order);
    scored
}

/// Delta field search with explicit selection semantics
#[derive(Debug, Clone)]
pub struct HotspotFinder {
    params: HotspotParams,
}

impl HotspotFinder {
    pub fn new(params: HotspotParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HotspotParams {
        &self.params
    }

    /// Rank one pair's delta using the configured selection and tie-break
    pub fn find(
        &self,
        previous: &Field,
        current: &Field,
        previous_coords: &CoordinateGrid,
        current_coords: &CoordinateGrid,
        labels: PairLabels<'_>,
    ) -> OceanResult<Vec<HotspotRecord>> {
        check_pair_shape(previous, current)?;
        for (name, coords) in [("previous", previous_coords), ("current", current_coords)] {
            if coords.dim() != current.dim() {
                return Err(OceanError::ShapeMismatch {
                    context: format!("{} coordinates", name),
                    expected: current.dim(),
                    found: coords.dim(),
                });
            }
        }

        let scored = candidates(previous, current, self.params.selection);
        let finite = scored.len();
        let ranked = rank_candidates(scored, self.params.top_k, self.params.tie_break);

        log::debug!(
            "{} -> {} [{}]: {} finite cells, {} {} hotspots",
            labels.from_granule,
            labels.to_granule,
            labels.field,
            finite,
            ranked.len(),
            self.params.selection
        );

        let cols = current.ncols();
        let records = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (flat_index, _))| {
                let (row, column) = (flat_index / cols, flat_index % cols);
                let (latitude, longitude) = resolve_coordinates(flat_index, previous_coords, current_coords);
                HotspotRecord {
                    rank: i + 1,
                    row,
                    column,
                    flat_index,
                    latitude,
                    longitude,
                    delta_value: cell_delta(previous[[row, column]], current[[row, column]]),
                    field: labels.field.to_string(),
                    from_granule: labels.from_granule.to_string(),
                    to_granule: labels.to_granule.to_string(),
                    selection: self.params.selection,
                }
            })
            .collect();

        Ok(records)
    }
}

/// Current-granule coordinates, falling back to the previous granule's
/// where the current navigation is missing
fn resolve_coordinates(flat_index: usize, previous: &CoordinateGrid, current: &CoordinateGrid) -> (f64, f64) {
    let cur = current.lookup(flat_index).unwrap_or((f64::NAN, f64::NAN));
    if cur.0.is_finite() && cur.1.is_finite() {
        return cur;
    }
    previous.lookup(flat_index).unwrap_or(cur)
}

fn find_with(
    selection: HotspotSelection,
    previous: &Field,
    current: &Field,
    previous_coords: &CoordinateGrid,
    current_coords: &CoordinateGrid,
    top_k: usize,
    labels: PairLabels<'_>,
) -> OceanResult<Vec<HotspotRecord>> {
    let finder = HotspotFinder::new(HotspotParams {
        top_k,
        selection,
        tie_break: TieBreak::FlatIndexAscending,
        delta_fields: vec![labels.field.to_string()],
    });
    finder.find(previous, current, previous_coords, current_coords, labels)
}

/// Growth hotspots: the `top_k` cells with the highest signed delta.
///
/// A strongly negative delta is never chosen over a smaller positive one.
/// Records are sorted by `delta_value` descending, ties by ascending flat
/// index, ranks dense from 1. Fewer than `top_k` finite cells yields fewer
/// records.
pub fn find_hotspots(
    previous: &Field,
    current: &Field,
    previous_coords: &CoordinateGrid,
    current_coords: &CoordinateGrid,
    top_k: usize,
    labels: PairLabels<'_>,
) -> OceanResult<Vec<HotspotRecord>> {
    find_with(HotspotSelection::Growth, previous, current, previous_coords, current_coords, top_k, labels)
}

/// Decline hotspots: the `top_k` most negative deltas, most negative first
pub fn find_decline_hotspots(
    previous: &Field,
    current: &Field,
    previous_coords: &CoordinateGrid,
    current_coords: &CoordinateGrid,
    top_k: usize,
    labels: PairLabels<'_>,
) -> OceanResult<Vec<HotspotRecord>> {
    find_with(HotspotSelection::Decline, previous, current, previous_coords, current_coords, top_k, labels)
}

/// Magnitude hotspots: the `top_k` largest `|delta|`, regardless of sign
pub fn find_magnitude_hotspots(
    previous: &Field,
    current: &Field,
    previous_coords: &CoordinateGrid,
    current_coords: &CoordinateGrid,
    top_k: usize,
    labels: PairLabels<'_>,
) -> OceanResult<Vec<HotspotRecord>> {
    find_with(HotspotSelection::Magnitude, previous, current, previous_coords, current_coords, top_k, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> PairLabels<'static> {
        PairLabels {
            field: "nflh",
            from_granule: "A",
            to_granule: "B",
        }
    }

    fn grid() -> CoordinateGrid {
        CoordinateGrid::new(array![[30.0, 30.0], [31.0, 31.0]], array![[-80.0, -79.0], [-80.0, -79.0]]).unwrap()
    }

    #[test]
    fn test_delta_propagates_nan() {
        let previous = array![[1.0, f32::NAN], [3.0, 4.0]];
        let current = array![[2.0, 2.0], [f32::NAN, 4.0]];
        let delta = compute_delta(&previous, &current).unwrap();
        assert_eq!(delta[[0, 0]], 1.0);
        assert!(delta[[0, 1]].is_nan());
        assert!(delta[[1, 0]].is_nan());
        assert_eq!(delta[[1, 1]], 0.0);
    }

    #[test]
    fn test_delta_beyond_f32_range_still_ranks() {
        let previous = array![[-3e38, 0.0]];
        let current = array![[3e38, 1.0]];
        let wide = CoordinateGrid::new(array![[0.0, 0.0]], array![[0.0, 1.0]]).unwrap();

        let records = find_hotspots(&previous, &current, &wide, &wide, 2, labels()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].flat_index, 0);
        assert!(records[0].delta_value.is_finite());
        assert!(records[0].delta_value > 5.9e38);
        assert_eq!(records[1].delta_value, 1.0);

        let magnitude = find_magnitude_hotspots(&current, &previous, &wide, &wide, 1, labels()).unwrap();
        assert_eq!(magnitude[0].flat_index, 0);
        assert!(magnitude[0].delta_value < -5.9e38);
    }

    #[test]
    fn test_rank_candidates_ties_ascending() {
        let scored = vec![(3, 1.0), (0, 2.0), (2, 2.0), (1, 0.5)];
        let ranked = rank_candidates(scored, 3, TieBreak::FlatIndexAscending);
        assert_eq!(ranked, vec![(0, 2.0), (2, 2.0), (3, 1.0)]);
    }

    #[test]
    fn test_rank_candidates_ties_descending() {
        let scored = vec![(3, 1.0), (0, 2.0), (2, 2.0), (1, 0.5)];
        let ranked = rank_candidates(scored, 2, TieBreak::FlatIndexDescending);
        assert_eq!(ranked, vec![(2, 2.0), (0, 2.0)]);
    }

    #[test]
    fn test_rank_candidates_zero_k() {
        assert!(rank_candidates(vec![(0, 1.0)], 0, TieBreak::FlatIndexAscending).is_empty());
    }

    #[test]
    fn test_growth_ignores_large_negative() {
        let previous = array![[0.0, 0.0], [0.0, 0.0]];
        let current = array![[-100.0, 0.5], [0.1, f32::NAN]];
        let records = find_hotspots(&previous, &current, &grid(), &grid(), 1, labels()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].flat_index, 1);
        assert_eq!(records[0].delta_value, 0.5);
    }

    #[test]
    fn test_decline_and_magnitude() {
        let previous = array![[0.0, 0.0], [0.0, 0.0]];
        let current = array![[-100.0, 0.5], [-3.0, 50.0]];

        let decline = find_decline_hotspots(&previous, &current, &grid(), &grid(), 2, labels()).unwrap();
        assert_eq!(decline.iter().map(|r| r.flat_index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(decline[0].delta_value, -100.0);
        assert_eq!(decline[0].selection, HotspotSelection::Decline);

        let magnitude = find_magnitude_hotspots(&previous, &current, &grid(), &grid(), 2, labels()).unwrap();
        assert_eq!(magnitude.iter().map(|r| r.flat_index).collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_coordinate_shape_mismatch() {
        let field = array![[0.0, 0.0], [0.0, 0.0]];
        let wide = CoordinateGrid::new(Field::zeros((2, 3)), Field::zeros((2, 3))).unwrap();
        let result = find_hotspots(&field, &field, &grid(), &wide, 1, labels());
        assert!(matches!(result, Err(OceanError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_coordinates_fall_back_to_previous() {
        let previous = array![[0.0, 0.0], [0.0, 0.0]];
        let current = array![[0.0, 0.0], [0.0, 9.0]];
        let mut missing_nav = grid();
        missing_nav.latitude[[1, 1]] = f32::NAN;

        let records = find_hotspots(&previous, &current, &grid(), &missing_nav, 1, labels()).unwrap();
        assert_eq!(records[0].latitude, 31.0);
        assert_eq!(records[0].longitude, -79.0);
    }
}
