//! Pixel window resolution for spatial selectors.

use crate::{ItsLiveError, C};
use log::{debug, warn};
use std::ops::RangeInclusive;

/// Extra distance around a selector, in kilometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Buffer {
    Uniform(C),
    PerAxis { x: C, y: C },
}

impl Default for Buffer {
    fn default() -> Self {
        Self::Uniform(0.0)
    }
}

impl Buffer {
    /// Returns (x, y) buffer in meters.
    pub fn meters(&self) -> (C, C) {
        match *self {
            Self::Uniform(km) => (km * 1000.0, km * 1000.0),
            Self::PerAxis { x, y } => (x * 1000.0, y * 1000.0),
        }
    }
}

/// Closed coordinate interval on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: C,
    pub max: C,
}

impl Limits {
    /// Interval spanning `a` and `b`, in either order.
    pub fn new(a: C, b: C) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Collapsed interval at `v`.
    pub fn point(v: C) -> Self {
        Self { min: v, max: v }
    }

    /// Smallest interval covering every value, or `None` if there are
    /// no finite values.
    pub fn covering<I: IntoIterator<Item = C>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, v| {
                Some(match acc {
                    None => Self::point(v),
                    Some(l) => Self::new(l.min.min(v), l.max.max(v)),
                })
            })
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Closed row and column index ranges into a mosaic, in storage
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Indices into the y axis.
    pub rows: RangeInclusive<usize>,

    /// Indices into the x axis.
    pub cols: RangeInclusive<usize>,
}

impl Window {
    /// Returns (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (
            self.rows.end() - self.rows.start() + 1,
            self.cols.end() - self.cols.start() + 1,
        )
    }
}

/// Resolves the window holding every sample of `x` and `y` within
/// the buffered limits.
///
/// An axis without limits spans the whole grid. A degenerate (single
/// value) limit has its buffer floored at one grid cell so it can't
/// fall between samples. Both axes may be ascending or descending.
pub fn resolve(
    x: &[C],
    y: &[C],
    xlim: Option<Limits>,
    ylim: Option<Limits>,
    buffer: Buffer,
) -> Result<Window, ItsLiveError> {
    let (buffer_x, buffer_y) = buffer.meters();
    if !(buffer_x >= 0.0 && buffer_y >= 0.0) {
        return Err(ItsLiveError::Selector(format!(
            "buffer must be a non-negative distance, got {buffer:?}"
        )));
    }
    let cols = axis_range(x, xlim, buffer_x, "x").ok_or(ItsLiveError::NoData)?;
    let rows = axis_range(y, ylim, buffer_y, "y").ok_or(ItsLiveError::NoData)?;
    let window = Window { rows, cols };
    debug!("resolved window {window:?} for xlim {xlim:?}, ylim {ylim:?}");
    Ok(window)
}

fn axis_range(
    axis: &[C],
    limits: Option<Limits>,
    buffer: C,
    name: &str,
) -> Option<RangeInclusive<usize>> {
    if axis.is_empty() {
        return None;
    }
    let Some(limits) = limits else {
        return Some(0..=axis.len() - 1);
    };
    let cell = match axis {
        [a, b, ..] => (b - a).abs(),
        _ => 0.0,
    };
    let buffer = if limits.is_degenerate() && buffer < cell {
        warn!(
            "single value {name} selector, flooring buffer from {buffer} m to one cell ({cell} m)"
        );
        cell
    } else {
        buffer
    };
    let (lo, hi) = (limits.min - buffer, limits.max + buffer);
    let descending = axis.len() > 1 && axis[1] < axis[0];
    let (start, end) = if descending {
        (axis.partition_point(|&v| v > hi), axis.partition_point(|&v| v >= lo))
    } else {
        (axis.partition_point(|&v| v < lo), axis.partition_point(|&v| v <= hi))
    };
    (start < end).then(|| start..=end - 1)
}

#[cfg(test)]
mod tests {
    use super::{resolve, Buffer, Limits, Window};
    use crate::ItsLiveError;

    fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_window_inclusion() {
        let x = axis(0.0, 120.0, 50);
        let y = axis(6000.0, -120.0, 40);
        // y runs from 6000 down to 1320.
        let cases = [
            (
                Limits::new(130.0, 1500.0),
                Limits::new(1000.0, 2000.0),
                Buffer::Uniform(0.0),
            ),
            (
                Limits::new(1500.0, 130.0),
                Limits::new(1400.0, 2100.0),
                Buffer::Uniform(0.25),
            ),
            (
                Limits::new(-1e6, 1e6),
                Limits::new(3000.0, 3000.5),
                Buffer::PerAxis { x: 0.0, y: 0.6 },
            ),
        ];
        for (xlim, ylim, buffer) in cases {
            let Window { rows, cols } =
                resolve(&x, &y, Some(xlim), Some(ylim), buffer).unwrap();
            let (bx, by) = buffer.meters();
            for (i, v) in x.iter().enumerate() {
                let inside = *v >= xlim.min - bx && *v <= xlim.max + bx;
                assert_eq!(inside, cols.contains(&i), "x[{i}] = {v}");
            }
            for (j, v) in y.iter().enumerate() {
                let inside = *v >= ylim.min - by && *v <= ylim.max + by;
                assert_eq!(inside, rows.contains(&j), "y[{j}] = {v}");
            }
        }

        // Within the buffer of the southern edge, but not of a sample.
        let south = Limits::new(-500.0, 1000.0);
        assert!(matches!(
            resolve(&x, &y, None, Some(south), Buffer::Uniform(0.25)),
            Err(ItsLiveError::NoData)
        ));
        let window = resolve(&x, &y, None, Some(south), Buffer::Uniform(0.4)).unwrap();
        assert_eq!(window.rows, 39..=39);
    }

    #[test]
    fn test_single_point_floor() {
        let x = axis(0.0, 120.0, 10);
        let y = axis(1080.0, -120.0, 10);
        // Strictly between samples on both axes.
        let (xlim, ylim) = (Limits::point(190.0), Limits::point(500.0));
        let window = resolve(&x, &y, Some(xlim), Some(ylim), Buffer::default()).unwrap();
        assert_eq!(window.cols, 1..=2);
        assert_eq!(window.rows, 4..=5);

        // On a sample, the floor reaches both neighbors.
        let window = resolve(&x, &y, Some(Limits::point(240.0)), None, Buffer::default()).unwrap();
        assert_eq!(window.cols, 1..=3);
        assert_eq!(window.rows, 0..=9);
    }

    #[test]
    fn test_whole_grid() {
        let x = axis(0.0, 1.0, 4);
        let y = axis(0.0, 1.0, 3);
        let window = resolve(&x, &y, None, None, Buffer::Uniform(100.0)).unwrap();
        assert_eq!(window.shape(), (3, 4));
    }

    #[test]
    fn test_outside_grid() {
        let x = axis(0.0, 120.0, 10);
        let y = axis(0.0, 120.0, 10);
        assert!(matches!(
            resolve(&x, &y, Some(Limits::new(5000.0, 6000.0)), None, Buffer::default()),
            Err(ItsLiveError::NoData)
        ));
        // The floor doesn't rescue a point more than a cell away.
        assert!(matches!(
            resolve(&x, &y, Some(Limits::point(-121.0)), None, Buffer::default()),
            Err(ItsLiveError::NoData)
        ));
        assert!(matches!(
            resolve(&x, &y, None, None, Buffer::Uniform(-1.0)),
            Err(ItsLiveError::Selector(_))
        ));
    }

    #[test]
    fn test_covering() {
        let l = Limits::covering([3.0, f64::NAN, -1.0, 2.0]).unwrap();
        assert_eq!(l, Limits::new(-1.0, 3.0));
        assert!(Limits::covering([f64::NAN]).is_none());
    }
}
