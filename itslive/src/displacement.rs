//! Forward and backward advection of points through the summary
//! velocity field.
//!
//! This is a first order explicit (Euler) scheme with steps of at most
//! one year. It uses a single static velocity field, so seasonal and
//! interannual changes are ignored and error accumulates with the
//! number of steps. Treat results as estimates.

use crate::{
    field::VelocityField,
    loader::to_native,
    progress::{Progress, ProgressEvent, Silent},
    projection::CoordMode,
    subset::{Buffer, Limits},
    ItsLiveError, MosaicStore, Region, C,
};
use geo::geometry::Coord;
use log::{debug, warn};
use ndarray::Array2;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Largest accepted `|dt|` (years).
pub const MAX_YEARS: C = 1000.0;

/// Hard cap on Euler steps for one (point, time) pair.
pub const MAX_ITERATIONS: usize = 1000;

/// Default half-width of the velocity window around a particle.
pub const DEFAULT_WINDOW_KM: C = 25.0;

/// Displaced positions indexed `[point, time]`. NaN where a particle
/// left the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Displaced {
    pub x: Array2<C>,
    pub y: Array2<C>,
}

pub struct Displacement;

impl Displacement {
    pub fn builder<'a>() -> DisplacementBuilder<'a> {
        DisplacementBuilder {
            region: None,
            points: None,
            dt: None,
            year: 0,
            window_km: DEFAULT_WINDOW_KM,
            progress: None,
        }
    }
}

pub struct DisplacementBuilder<'a> {
    region: Option<&'static Region>,

    points: Option<(Vec<(C, C)>, CoordMode)>,

    /// Elapsed times (years), negative to go back in time.
    dt: Option<Vec<C>>,

    /// Year slot of the velocity field.
    year: u16,

    window_km: C,

    progress: Option<&'a dyn Progress>,
}

impl<'a> DisplacementBuilder<'a> {
    pub fn region(mut self, region: &'static Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn points(mut self, points: Vec<(C, C)>, mode: CoordMode) -> Self {
        self.points = Some((points, mode));
        self
    }

    pub fn dt(mut self, years: Vec<C>) -> Self {
        self.dt = Some(years);
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn window(mut self, km: C) -> Self {
        self.window_km = km;
        self
    }

    pub fn progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(&self, store: &MosaicStore) -> Result<Displaced, ItsLiveError> {
        let region = self.region.ok_or(ItsLiveError::Builder("region"))?;
        let (pairs, mode) = self.points.as_ref().ok_or(ItsLiveError::Builder("points"))?;
        let dts = self.dt.as_ref().ok_or(ItsLiveError::Builder("dt"))?;
        if pairs.is_empty() || dts.is_empty() {
            return Err(ItsLiveError::Selector("need at least one point and one dt".to_owned()));
        }
        for &dt in dts {
            if !dt.is_finite() || dt.abs() > MAX_YEARS {
                return Err(ItsLiveError::OutOfRange(format!(
                    "dt of {dt} years exceeds the {MAX_YEARS} year limit, check units"
                )));
            }
        }
        if !(self.window_km.is_finite() && self.window_km > 0.0) {
            return Err(ItsLiveError::Selector(format!(
                "window must be positive, got {} km",
                self.window_km
            )));
        }
        if let Some(dt) = dts.iter().copied().find(|dt| dt.abs() > 1.0) {
            warn!(
                "dt of {dt} years spans more than one annual cycle, only the static field is used"
            );
        }

        let starts = to_native(store, region, pairs, *mode)?;
        let (n_points, n_times) = (starts.len(), dts.len());
        let total = n_points * n_times;
        let done = AtomicUsize::new(0);
        let progress = self.progress.unwrap_or(&Silent);

        let ends = (0..total)
            .into_par_iter()
            .map(|i| {
                let (start, dt) = (starts[i / n_times], dts[i % n_times]);
                let mut sampler = WindowedSampler {
                    store,
                    region,
                    year: self.year,
                    window_km: self.window_km,
                    field: None,
                };
                let end = advect(&mut sampler, start, dt)?;
                let done = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.update(ProgressEvent::Point { done, total })?;
                Ok(end)
            })
            .collect::<Result<Vec<_>, ItsLiveError>>()?;

        let mut x = Array2::from_elem((n_points, n_times), C::NAN);
        let mut y = Array2::from_elem((n_points, n_times), C::NAN);
        for (i, end) in ends.into_iter().enumerate() {
            if let Some(end) = end {
                x[[i / n_times, i % n_times]] = end.x;
                y[[i / n_times, i % n_times]] = end.y;
            }
        }
        Ok(Displaced { x, y })
    }
}

/// Loads velocity windows around a moving particle on demand.
struct WindowedSampler<'s> {
    store: &'s MosaicStore,
    region: &'static Region,
    year: u16,
    window_km: C,
    field: Option<VelocityField>,
}

impl<'s> WindowedSampler<'s> {
    /// Velocity at `p`, `None` outside the mosaic or where undefined.
    fn velocity(&mut self, p: Coord<C>) -> Result<Option<Coord<C>>, ItsLiveError> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Ok(None);
        }
        if let Some(field) = self.field.as_ref().filter(|f| f.contains(p)) {
            return Ok(field.velocity(p));
        }
        debug!("loading velocity window around {p:?}");
        self.field = match VelocityField::load(
            self.store,
            self.region,
            self.year,
            Limits::point(p.x),
            Limits::point(p.y),
            Buffer::Uniform(self.window_km),
            None,
            false,
            &Silent,
        ) {
            Ok(field) => Some(field),
            Err(ItsLiveError::NoData) => None,
            Err(e) => return Err(e),
        };
        Ok(self.field.as_ref().and_then(|f| f.velocity(p)))
    }
}

/// Euler integration over `dt` years in steps of at most one year.
fn advect(
    sampler: &mut WindowedSampler<'_>,
    start: Coord<C>,
    dt: C,
) -> Result<Option<Coord<C>>, ItsLiveError> {
    let sign = dt.signum();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = dt.abs().floor() as usize;
    let partial = dt.abs() - dt.abs().floor();
    let steps = std::iter::repeat(sign)
        .take(whole)
        .chain((partial > 0.0).then_some(sign * partial));

    let mut p = start;
    for (iteration, step) in steps.enumerate() {
        if iteration >= MAX_ITERATIONS {
            return Err(ItsLiveError::IterationLimit(MAX_ITERATIONS));
        }
        let Some(v) = sampler.velocity(p)? else {
            return Ok(None);
        };
        p = p + v * step;
    }
    // The end point must be on the data too.
    Ok(sampler.velocity(p)?.map(|_| p))
}

#[cfg(test)]
mod tests {
    use super::{Displacement, MAX_YEARS};
    use crate::{
        progress::{Cancelled, ProgressEvent},
        projection::CoordMode,
        testdata::{self, SPEED},
        ItsLiveError, Region,
    };
    use approx::assert_abs_diff_eq;

    fn ala() -> &'static Region {
        Region::from_id(1).unwrap()
    }

    #[test]
    fn test_uniform_field() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let out = Displacement::builder()
            .region(ala())
            .points(vec![(0.0, 0.0), (-1000.0, 500.0)], CoordMode::Native)
            .dt(vec![2.5, -3.0, 0.0])
            .build(&store)
            .unwrap();
        let speed = f64::from(SPEED);
        assert_eq!(out.x.dim(), (2, 3));
        assert_abs_diff_eq!(out.x[[0, 0]], 2.5 * speed, epsilon = 1e-9);
        assert_abs_diff_eq!(out.x[[0, 1]], -3.0 * speed, epsilon = 1e-9);
        assert_abs_diff_eq!(out.x[[0, 2]], 0.0);
        assert_abs_diff_eq!(out.x[[1, 0]], -1000.0 + 2.5 * speed, epsilon = 1e-9);
        for (y, expected) in out.y.iter().zip([0.0, 0.0, 0.0, 500.0, 500.0, 500.0]) {
            assert_abs_diff_eq!(*y, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_leaving_coverage_is_nan() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let out = Displacement::builder()
            .region(ala())
            .points(vec![(19_900.0, 0.0)], CoordMode::Native)
            .dt(vec![0.5, 5.0])
            .build(&store)
            .unwrap();
        assert_abs_diff_eq!(out.x[[0, 0]], 19_950.0, epsilon = 1e-9);
        assert!(out.x[[0, 1]].is_nan() && out.y[[0, 1]].is_nan());
    }

    #[test]
    fn test_forward_then_back() {
        let omega = 1e-3;
        let (_dir, store) = testdata::field_store(
            &move |_, y| (-omega * y) as f32,
            &move |x, _| (omega * x) as f32,
        );
        let forward = Displacement::builder()
            .region(ala())
            .points(vec![(5000.0, 0.0)], CoordMode::Native)
            .dt(vec![10.0])
            .build(&store)
            .unwrap();
        let (x1, y1) = (forward.x[[0, 0]], forward.y[[0, 0]]);
        assert!(y1 > 0.0);
        let back = Displacement::builder()
            .region(ala())
            .points(vec![(x1, y1)], CoordMode::Native)
            .dt(vec![-10.0])
            .build(&store)
            .unwrap();
        assert_abs_diff_eq!(back.x[[0, 0]], 5000.0, epsilon = 1.0);
        assert_abs_diff_eq!(back.y[[0, 0]], 0.0, epsilon = 1.0);
    }

    #[test]
    fn test_window_reloads() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let out = Displacement::builder()
            .region(ala())
            .points(vec![(-15_000.0, 2000.0)], CoordMode::Native)
            .dt(vec![300.0])
            .window(3.0)
            .build(&store)
            .unwrap();
        assert_abs_diff_eq!(out.x[[0, 0]], -15_000.0 + 300.0 * f64::from(SPEED), epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_long_spans_before_io() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        // No Antarctic mosaic exists, so any I/O would fail differently.
        let ant = Region::from_id(19).unwrap();
        for dt in [MAX_YEARS + 1.0, -(MAX_YEARS + 1.0), f64::NAN] {
            assert!(matches!(
                Displacement::builder()
                    .region(ant)
                    .points(vec![(0.0, 0.0)], CoordMode::Native)
                    .dt(vec![1.0, dt])
                    .build(&store),
                Err(ItsLiveError::OutOfRange(_))
            ));
        }
        assert!(matches!(
            Displacement::builder()
                .region(ant)
                .points(vec![(0.0, 0.0)], CoordMode::Native)
                .build(&store),
            Err(ItsLiveError::Builder("dt"))
        ));
    }

    #[test]
    fn test_batch_independence() {
        let (_dir, store) = testdata::field_store(
            &|x, _| (20.0 + x / 1000.0) as f32,
            &|x, y| ((x - y) / 800.0) as f32,
        );
        let points = vec![(0.0, 0.0), (-4000.0, 3000.0), (f64::NAN, 0.0)];
        let dts = vec![7.25, -4.5];
        let batch = Displacement::builder()
            .region(ala())
            .points(points.clone(), CoordMode::Native)
            .dt(dts.clone())
            .build(&store)
            .unwrap();
        assert!(batch.x[[2, 0]].is_nan() && batch.x[[2, 1]].is_nan());
        for (i, point) in points.iter().take(2).enumerate() {
            for (j, dt) in dts.iter().enumerate() {
                let alone = Displacement::builder()
                    .region(ala())
                    .points(vec![*point], CoordMode::Native)
                    .dt(vec![*dt])
                    .build(&store)
                    .unwrap();
                assert_eq!(batch.x[[i, j]], alone.x[[0, 0]]);
                assert_eq!(batch.y[[i, j]], alone.y[[0, 0]]);
            }
        }
    }

    #[test]
    fn test_cancel() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let cancel = |event: ProgressEvent| -> Result<(), Cancelled> {
            assert!(matches!(event, ProgressEvent::Point { total: 2, .. }));
            Err(Cancelled)
        };
        assert!(matches!(
            Displacement::builder()
                .region(ala())
                .points(vec![(0.0, 0.0), (1.0, 1.0)], CoordMode::Native)
                .dt(vec![1.0])
                .progress(&cancel)
                .build(&store),
            Err(ItsLiveError::Cancelled)
        ));
    }
}
