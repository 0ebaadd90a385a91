//! Sampling of north-up grids at fractional indices.

use crate::C;
use ndarray::ArrayView2;

/// Returns the fractional index of `v` on the evenly spaced `axis`,
/// or `None` if `v` lies outside the first and last samples.
pub(crate) fn fractional_index(axis: &[C], v: C) -> Option<C> {
    match axis {
        [] => None,
        [only] => (v == *only).then_some(0.0),
        [first, second, ..] => {
            let f = (v - first) / (second - first);
            #[allow(clippy::cast_precision_loss)]
            let last = (axis.len() - 1) as C;
            // Absorb rounding at the hull edges.
            let f = if f < 0.0 && f > -1e-9 {
                0.0
            } else if f > last && f < last + 1e-9 {
                last
            } else {
                f
            };
            (0.0..=last).contains(&f).then_some(f)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell(f: C, len: usize) -> (usize, C) {
    if len < 2 {
        return (0, 0.0);
    }
    let i = (f.floor() as usize).min(len - 2);
    (i, f - i as C)
}

/// Bilinear interpolation at fractional (`row`, `col`).
///
/// Corners with zero weight are ignored, so sampling exactly on a
/// valid sample next to a NaN stays finite. Any weighted NaN corner
/// yields NaN.
pub(crate) fn bilinear(values: ArrayView2<f32>, row: C, col: C) -> C {
    let (rows, cols) = values.dim();
    let (r, tr) = cell(row, rows);
    let (c, tc) = cell(col, cols);
    let mut acc = 0.0;
    for (dr, wr) in [(0, 1.0 - tr), (1, tr)] {
        for (dc, wc) in [(0, 1.0 - tc), (1, tc)] {
            let w = wr * wc;
            if w == 0.0 {
                continue;
            }
            acc += w * C::from(values[[r + dr, c + dc]]);
        }
    }
    acc
}

/// Value of the sample nearest fractional (`row`, `col`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn nearest<T: Copy>(values: ArrayView2<T>, row: C, col: C) -> T {
    let (rows, cols) = values.dim();
    let r = (row.round().max(0.0) as usize).min(rows - 1);
    let c = (col.round().max(0.0) as usize).min(cols - 1);
    values[[r, c]]
}
