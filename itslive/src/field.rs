//! Velocity field windows for path integration.

use crate::{
    loader::{load_native, Grid, Values},
    math::{bilinear, fractional_index, nearest},
    progress::{Progress, ProgressEvent, Silent},
    subset::{Buffer, Limits},
    ItsLiveError, MosaicStore, Region, C,
};
use geo::geometry::Coord;
use log::debug;
use ndarray::{s, Array2, Zip};

/// Data quality thresholds applied before tracing.
///
/// A cell failing any test is removed from the field and can't be
/// traversed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screening {
    /// Minimum speed `v` (m/yr).
    pub min_speed: C,

    /// Minimum number of image pairs behind a cell (`count`).
    pub min_count: C,

    /// Maximum `v_error / v`.
    pub max_error_ratio: C,

    /// Drop cells outside the `landice` mask.
    pub require_landice: bool,
}

impl Default for Screening {
    fn default() -> Self {
        Self {
            min_speed: 5.0,
            min_count: 3.0,
            max_error_ratio: 1.0,
            require_landice: true,
        }
    }
}

/// A window of `vx` and `vy` sampled bilinearly.
pub(crate) struct VelocityField {
    /// Ascending.
    x: Vec<C>,

    /// Descending.
    y: Vec<C>,

    vx: Array2<f32>,
    vy: Array2<f32>,

    /// Grounded ice, when requested.
    landice: Option<Array2<bool>>,
}

impl VelocityField {
    /// Loads `vx`, `vy` and whatever `screening` and `with_landice`
    /// need, one [`ProgressEvent::Load`] per variable.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn load(
        store: &MosaicStore,
        region: &'static Region,
        year: u16,
        xlim: Limits,
        ylim: Limits,
        buffer: Buffer,
        screening: Option<&Screening>,
        with_landice: bool,
        progress: &dyn Progress,
    ) -> Result<Self, ItsLiveError> {
        let years = [year];
        let with_landice = with_landice || screening.is_some_and(|s| s.require_landice);
        let total = 2 + usize::from(with_landice) + if screening.is_some() { 3 } else { 0 };
        let mut done = 0;
        progress.update(ProgressEvent::Load { done, total })?;
        let mut load = |name: &str| -> Result<Grid, ItsLiveError> {
            let extent = (Some(xlim), Some(ylim));
            let grid = load_native(store, region, name, extent, buffer, &years, &Silent)?;
            done += 1;
            progress.update(ProgressEvent::Load { done, total })?;
            Ok(grid)
        };

        let vx_grid = load("vx")?;
        let (x, y) = vx_grid
            .native_axes()
            .map(|(x, y)| (x.to_vec(), y.to_vec()))
            .ok_or(ItsLiveError::NoData)?;
        let mut vx = layer(&vx_grid)?;
        let mut vy = layer(&load("vy")?)?;

        let landice = if with_landice {
            Some(mask_layer(&load("landice")?)?)
        } else {
            None
        };

        if let Some(screening) = screening {
            let v = layer(&load("v")?)?;
            let count = layer(&load("count")?)?;
            let v_error = layer(&load("v_error")?)?;
            let mut keep = Array2::from_elem(v.dim(), true);
            Zip::from(&mut keep)
                .and(&v)
                .and(&count)
                .and(&v_error)
                .for_each(|keep, &v, &count, &err| {
                    let (v, count, err) = (C::from(v), C::from(count), C::from(err));
                    *keep = v >= screening.min_speed
                        && count >= screening.min_count
                        && err <= screening.max_error_ratio * v;
                });
            if screening.require_landice {
                if let Some(landice) = &landice {
                    Zip::from(&mut keep).and(landice).for_each(|keep, &ice| *keep &= ice);
                }
            }
            let removed = keep.iter().filter(|k| !**k).count();
            debug!("screening removed {removed} of {} cells", keep.len());
            Zip::from(&mut vx).and(&mut vy).and(&keep).for_each(|vx, vy, &keep| {
                if !keep {
                    *vx = f32::NAN;
                    *vy = f32::NAN;
                }
            });
        }

        Ok(Self { x, y, vx, vy, landice })
    }

    /// Grid spacing along x (meters).
    pub(crate) fn cell_size(&self) -> C {
        match self.x.as_slice() {
            [a, b, ..] => (b - a).abs(),
            _ => 0.0,
        }
    }

    fn index(&self, p: Coord<C>) -> Option<(C, C)> {
        Some((fractional_index(&self.y, p.y)?, fractional_index(&self.x, p.x)?))
    }

    pub(crate) fn contains(&self, p: Coord<C>) -> bool {
        self.index(p).is_some()
    }

    /// Bilinear velocity at `p`, `None` outside the window or where
    /// the field is undefined.
    pub(crate) fn velocity(&self, p: Coord<C>) -> Option<Coord<C>> {
        let (r, c) = self.index(p)?;
        let v = Coord {
            x: bilinear(self.vx.view(), r, c),
            y: bilinear(self.vy.view(), r, c),
        };
        (v.x.is_finite() && v.y.is_finite()).then_some(v)
    }

    /// Speed at `p`, NaN where [`VelocityField::velocity`] is `None`.
    pub(crate) fn speed(&self, p: Coord<C>) -> C {
        self.velocity(p).map_or(C::NAN, |v| v.x.hypot(v.y))
    }

    /// Nearest `landice` cell, if loaded and `p` is inside.
    pub(crate) fn grounded(&self, p: Coord<C>) -> Option<bool> {
        let (r, c) = self.index(p)?;
        Some(nearest(self.landice.as_ref()?.view(), r, c))
    }
}

fn layer(grid: &Grid) -> Result<Array2<f32>, ItsLiveError> {
    match &grid.values {
        Values::Continuous(v) => Ok(v.slice(s![.., .., 0]).to_owned()),
        Values::Mask(_) => Err(ItsLiveError::Selector(format!(
            "'{}' is a mask, expected a continuous variable",
            grid.variable
        ))),
    }
}

fn mask_layer(grid: &Grid) -> Result<Array2<bool>, ItsLiveError> {
    Ok(match &grid.values {
        Values::Mask(v) => v.slice(s![.., .., 0]).to_owned(),
        Values::Continuous(v) => v.slice(s![.., .., 0]).mapv(|v| v != 0.0 && !v.is_nan()),
    })
}
