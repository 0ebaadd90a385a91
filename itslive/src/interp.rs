//! Point and path interpolation of gridded variables.

use crate::{
    loader::{load_native, to_native, Grid, Values},
    math::{bilinear, fractional_index, gradient, nearest},
    progress::Silent,
    projection::{looks_geographic, CoordMode},
    subset::{Buffer, Limits},
    ItsLiveError, MosaicStore, Region, C,
};
use geo::geometry::Coord;
use log::warn;
use mosaic::{Axis, VariableKind};
use ndarray::{s, Array2};
use std::str::FromStr;

/// Minimum buffer around query points.
const MIN_BUFFER_M: C = 1000.0;

/// Minimum buffer around query points, in grid cells.
const MIN_BUFFER_CELLS: C = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Linear,
    Nearest,
}

impl FromStr for Method {
    type Err = ItsLiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "nearest" => Ok(Self::Nearest),
            other => Err(ItsLiveError::Selector(format!(
                "unknown method '{other}', valid methods are: linear, nearest"
            ))),
        }
    }
}

/// What to interpolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quantity {
    /// A mosaic variable.
    Variable(String),

    /// Velocity component along the query path.
    Along,

    /// Velocity component across the query path, positive to the
    /// right of travel.
    Across,
}

impl FromStr for Quantity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "along" => Self::Along,
            "across" => Self::Across,
            name => Self::Variable(name.to_owned()),
        })
    }
}

/// Interpolated values indexed `[point, year]`.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpValues {
    /// NaN where a point is outside the data.
    Continuous(Array2<C>),

    /// False where a point is outside the data.
    Mask(Array2<bool>),
}

impl InterpValues {
    /// Returns (points, years).
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Self::Continuous(v) => v.dim(),
            Self::Mask(v) => v.dim(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Continuous(C),
    Mask(bool),
}

/// Either a lone sample or the full result, see
/// [`Interpolated::squeeze`].
#[derive(Debug, Clone, PartialEq)]
pub enum Squeezed {
    Scalar(Sample),
    Array(InterpValues),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    pub years: Vec<u16>,
    pub values: InterpValues,
}

impl Interpolated {
    /// Collapses a single point, single year result to a scalar.
    ///
    /// The rank of the output depends on the query shape: one point
    /// and one year give [`Squeezed::Scalar`], anything else gives
    /// [`Squeezed::Array`] with the usual `[point, year]` layout.
    pub fn squeeze(self) -> Squeezed {
        match self.values {
            InterpValues::Continuous(v) if v.dim() == (1, 1) => {
                Squeezed::Scalar(Sample::Continuous(v[[0, 0]]))
            }
            InterpValues::Mask(v) if v.dim() == (1, 1) => Squeezed::Scalar(Sample::Mask(v[[0, 0]])),
            values => Squeezed::Array(values),
        }
    }
}

pub struct Interp;

impl Interp {
    pub fn builder() -> InterpBuilder {
        InterpBuilder {
            region: None,
            quantity: None,
            points: None,
            years: None,
            method: None,
        }
    }
}

pub struct InterpBuilder {
    region: Option<&'static Region>,

    quantity: Option<Quantity>,

    /// Query pairs and how to read them.
    points: Option<(Vec<(C, C)>, CoordMode)>,

    /// Year slots, 0 (summary) if unset.
    years: Option<Vec<u16>>,

    /// Overrides the per-kind default.
    method: Option<Method>,
}

impl InterpBuilder {
    pub fn region(mut self, region: &'static Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn variable(self, name: &str) -> Self {
        self.quantity(Quantity::Variable(name.to_owned()))
    }

    pub fn points(mut self, points: Vec<(C, C)>, mode: CoordMode) -> Self {
        self.points = Some((points, mode));
        self
    }

    pub fn years(mut self, years: Vec<u16>) -> Self {
        self.years = Some(years);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn build(&self, store: &MosaicStore) -> Result<Interpolated, ItsLiveError> {
        let region = self.region.ok_or(ItsLiveError::Builder("region"))?;
        let quantity = self.quantity.as_ref().ok_or(ItsLiveError::Builder("quantity"))?;
        let (pairs, mode) = self.points.as_ref().ok_or(ItsLiveError::Builder("points"))?;
        if pairs.is_empty() {
            return Err(ItsLiveError::Selector("no query points".to_owned()));
        }
        let years = match &self.years {
            None => vec![0],
            Some(years) if years.is_empty() => {
                return Err(ItsLiveError::Selector("empty year list".to_owned()))
            }
            Some(years) => years.clone(),
        };

        if *mode == CoordMode::Auto {
            warn_if_ambiguous(store, region, pairs, years[0])?;
        }
        let native = to_native(store, region, pairs, *mode)?;

        let values = match quantity {
            Quantity::Variable(name) => {
                interp_native(store, region, name, &native, &years, self.method)?
            }
            Quantity::Along | Quantity::Across => {
                flux_gate(store, region, quantity, &native, &years, self.method)?
            }
        };
        Ok(Interpolated { years, values })
    }
}

/// Interpolates `variable` at native points.
pub(crate) fn interp_native(
    store: &MosaicStore,
    region: &'static Region,
    variable: &str,
    points: &[Coord<C>],
    years: &[u16],
    method: Option<Method>,
) -> Result<InterpValues, ItsLiveError> {
    let reference = store.open(region, years[0])?;
    let kind = reference.variable(variable)?.kind();
    let method = method.unwrap_or(match kind {
        VariableKind::Continuous => Method::Linear,
        VariableKind::Mask => Method::Nearest,
    });
    let cell = match reference.axis(Axis::X) {
        [a, b, ..] => (b - a).abs(),
        _ => 0.0,
    };
    let buffer_km = MIN_BUFFER_M.max(MIN_BUFFER_CELLS * cell) / 1000.0;

    let xlim = Limits::covering(points.iter().map(|p| p.x));
    let ylim = Limits::covering(points.iter().map(|p| p.y));
    let grid = match (xlim, ylim) {
        (Some(xlim), Some(ylim)) => {
            let extent = (Some(xlim), Some(ylim));
            let buffer = Buffer::Uniform(buffer_km);
            match load_native(store, region, variable, extent, buffer, years, &Silent) {
                Ok(grid) => Some(grid),
                Err(ItsLiveError::NoData) => None,
                Err(e) => return Err(e),
            }
        }
        _ => None,
    };

    let shape = (points.len(), years.len());
    match grid.as_ref().and_then(|grid| Some((grid, grid.native_axes()?))) {
        Some((grid, (x, y))) => Ok(sample_grid(grid, x, y, points, method)),
        None => Ok(match (kind, method) {
            (VariableKind::Mask, Method::Nearest) => {
                InterpValues::Mask(Array2::from_elem(shape, false))
            }
            _ => InterpValues::Continuous(Array2::from_elem(shape, C::NAN)),
        }),
    }
}

fn sample_grid(grid: &Grid, x: &[C], y: &[C], points: &[Coord<C>], method: Method) -> InterpValues {
    let shape = (points.len(), grid.years.len());
    let indices: Vec<Option<(C, C)>> = points
        .iter()
        .map(|p| Some((fractional_index(y, p.y)?, fractional_index(x, p.x)?)))
        .collect();

    match (&grid.values, method) {
        (Values::Continuous(stack), _) => {
            let mut out = Array2::from_elem(shape, C::NAN);
            for (k, _) in grid.years.iter().enumerate() {
                let layer = stack.slice(s![.., .., k]);
                for (i, idx) in indices.iter().enumerate() {
                    if let Some((r, c)) = *idx {
                        out[[i, k]] = match method {
                            Method::Linear => bilinear(layer, r, c),
                            Method::Nearest => C::from(nearest(layer, r, c)),
                        };
                    }
                }
            }
            InterpValues::Continuous(out)
        }
        (Values::Mask(stack), Method::Nearest) => {
            let mut out = Array2::from_elem(shape, false);
            for (k, _) in grid.years.iter().enumerate() {
                let layer = stack.slice(s![.., .., k]);
                for (i, idx) in indices.iter().enumerate() {
                    if let Some((r, c)) = *idx {
                        out[[i, k]] = nearest(layer, r, c);
                    }
                }
            }
            InterpValues::Mask(out)
        }
        (Values::Mask(stack), Method::Linear) => {
            let mut out = Array2::from_elem(shape, C::NAN);
            for (k, _) in grid.years.iter().enumerate() {
                let layer = stack.slice(s![.., .., k]).mapv(|b| f32::from(u8::from(b)));
                for (i, idx) in indices.iter().enumerate() {
                    if let Some((r, c)) = *idx {
                        out[[i, k]] = bilinear(layer.view(), r, c);
                    }
                }
            }
            InterpValues::Continuous(out)
        }
    }
}

/// Along or across track velocity on the path through `points`.
fn flux_gate(
    store: &MosaicStore,
    region: &'static Region,
    quantity: &Quantity,
    points: &[Coord<C>],
    years: &[u16],
    method: Option<Method>,
) -> Result<InterpValues, ItsLiveError> {
    if points.len() < 2 {
        return Err(ItsLiveError::Selector(
            "along/across need a path of at least two points".to_owned(),
        ));
    }
    let theta = path_heading(points)?;
    let continuous = |values: InterpValues| match values {
        InterpValues::Continuous(v) => Ok(v),
        InterpValues::Mask(_) => Err(ItsLiveError::Selector(
            "velocity components must be continuous".to_owned(),
        )),
    };
    let vx = continuous(interp_native(store, region, "vx", points, years, method)?)?;
    let vy = continuous(interp_native(store, region, "vy", points, years, method)?)?;

    let mut out = Array2::from_elem(vx.dim(), C::NAN);
    for ((i, k), o) in out.indexed_iter_mut() {
        let (sin, cos) = theta[i].sin_cos();
        let (u, v) = (vx[[i, k]], vy[[i, k]]);
        *o = match quantity {
            Quantity::Along => u * cos + v * sin,
            _ => u * sin - v * cos,
        };
    }
    Ok(InterpValues::Continuous(out))
}

/// Heading (radians from +x) of the path tangent at every vertex.
///
/// Repeated vertices take the heading of the first in their run.
fn path_heading(points: &[Coord<C>]) -> Result<Vec<C>, ItsLiveError> {
    let mut kept: Vec<Coord<C>> = Vec::with_capacity(points.len());
    let mut distance: Vec<C> = Vec::with_capacity(points.len());
    let mut slots = Vec::with_capacity(points.len());
    for &p in points {
        match (kept.last(), distance.last()) {
            (Some(last), Some(&total)) => {
                let step = (p.x - last.x).hypot(p.y - last.y);
                if step > 0.0 {
                    kept.push(p);
                    distance.push(total + step);
                }
            }
            _ => {
                kept.push(p);
                distance.push(0.0);
            }
        }
        slots.push(kept.len() - 1);
    }
    if kept.len() < 2 {
        return Err(ItsLiveError::Selector(
            "along/across need a path of non-zero length".to_owned(),
        ));
    }
    let xs: Vec<C> = kept.iter().map(|p| p.x).collect();
    let ys: Vec<C> = kept.iter().map(|p| p.y).collect();
    let dx = gradient(&xs, &distance);
    let dy = gradient(&ys, &distance);
    Ok(slots.into_iter().map(|i| dy[i].atan2(dx[i])).collect())
}

/// Logs a warning when automatic detection picks geographic but the
/// same numbers also land inside the region's native grid.
fn warn_if_ambiguous(
    store: &MosaicStore,
    region: &Region,
    pairs: &[(C, C)],
    year: u16,
) -> Result<(), ItsLiveError> {
    if !looks_geographic(pairs) {
        return Ok(());
    }
    let mosaic = store.open(region, year)?;
    let inside = |axis: &[C], v: C| {
        Limits::covering(axis.iter().copied()).is_some_and(|l| v >= l.min && v <= l.max)
    };
    let (x, y) = (mosaic.axis(Axis::X), mosaic.axis(Axis::Y));
    if pairs.iter().all(|&(a, b)| inside(x, a) && inside(y, b)) {
        warn!("coordinates could be native or geographic, treating them as (lat, lon)");
    }
    Ok(())
}
