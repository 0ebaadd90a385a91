//! Gridded variable loading.

use crate::{
    math::linspace,
    progress::{Progress, ProgressEvent, Silent},
    projection::CoordMode,
    subset::{self, Buffer, Limits, Window},
    ItsLiveError, MosaicStore, Region, C,
};
use geo::geometry::Coord;
use log::{debug, warn};
use mosaic::{Axis, VariableKind};
use ndarray::{s, Array2, Array3, Axis as NdAxis};
use rayon::prelude::*;

/// Geographic grids larger than this many cells trigger a warning and
/// a [`ProgressEvent::LargeGeographicGrid`].
pub const DEFAULT_GEO_WARN_CELLS: usize = 1_000_000;

/// Points sampled along each edge of a lat/lon box when converting
/// it to a native extent.
const EDGE_SAMPLES: usize = 33;

/// Stacked samples, indexed `[row, col, year]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Fill replaced with NaN.
    Continuous(Array3<f32>),

    /// Fill and zero are false.
    Mask(Array3<bool>),
}

impl Values {
    /// Returns (rows, cols, years).
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::Continuous(v) => v.dim(),
            Self::Mask(v) => v.dim(),
        }
    }

    pub fn as_continuous(&self) -> Option<&Array3<f32>> {
        match self {
            Self::Continuous(v) => Some(v),
            Self::Mask(_) => None,
        }
    }

    pub fn as_mask(&self) -> Option<&Array3<bool>> {
        match self {
            Self::Mask(v) => Some(v),
            Self::Continuous(_) => None,
        }
    }
}

/// Coordinates of a loaded grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCoords {
    /// Native axes: `x` ascending, `y` descending (row 0 is north).
    Native { x: Vec<C>, y: Vec<C> },

    /// Per-cell latitude and longitude, shaped like one year of
    /// values.
    Geographic { lat: Array2<C>, lon: Array2<C> },
}

/// A window of one variable over one or more years.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub region: &'static Region,
    pub variable: String,
    pub kind: VariableKind,
    pub years: Vec<u16>,

    /// North-up values. The year dimension is kept even for a single
    /// year.
    pub values: Values,

    pub coords: GridCoords,

    /// Window into the mosaic, in storage order.
    pub window: Window,
}

impl Grid {
    /// Returns the native (x, y) axes, if the grid has them.
    pub fn native_axes(&self) -> Option<(&[C], &[C])> {
        match &self.coords {
            GridCoords::Native { x, y } => Some((x, y)),
            GridCoords::Geographic { .. } => None,
        }
    }
}

/// Spatial part of a [`GridQuery`].
#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Whole,
    Native {
        xlim: Option<Limits>,
        ylim: Option<Limits>,
    },
    Geographic {
        latlim: Limits,
        lonlim: Limits,
    },
    Points(Vec<(C, C)>, CoordMode),
}

pub struct GridQuery;

impl GridQuery {
    pub fn builder<'a>() -> GridQueryBuilder<'a> {
        GridQueryBuilder {
            region: None,
            variable: None,
            xlim: None,
            ylim: None,
            latlim: None,
            lonlim: None,
            points: None,
            buffer: Buffer::default(),
            years: None,
            geo_output: false,
            geo_warn_cells: DEFAULT_GEO_WARN_CELLS,
            progress: None,
        }
    }
}

pub struct GridQueryBuilder<'a> {
    region: Option<&'static Region>,

    variable: Option<String>,

    /// Native limits (meters).
    xlim: Option<Limits>,
    ylim: Option<Limits>,

    /// Geographic limits (degrees).
    latlim: Option<Limits>,
    lonlim: Option<Limits>,

    /// Point set whose extent selects the window.
    points: Option<(Vec<(C, C)>, CoordMode)>,

    buffer: Buffer,

    /// Year slots to stack, 0 (summary) if unset.
    years: Option<Vec<u16>>,

    /// Return per-cell lat/lon instead of native axes.
    geo_output: bool,

    geo_warn_cells: usize,

    progress: Option<&'a dyn Progress>,
}

impl<'a> GridQueryBuilder<'a> {
    pub fn region(mut self, region: &'static Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn variable(mut self, name: &str) -> Self {
        self.variable = Some(name.to_owned());
        self
    }

    pub fn xlim(mut self, a: C, b: C) -> Self {
        self.xlim = Some(Limits::new(a, b));
        self
    }

    pub fn ylim(mut self, a: C, b: C) -> Self {
        self.ylim = Some(Limits::new(a, b));
        self
    }

    pub fn latlim(mut self, a: C, b: C) -> Self {
        self.latlim = Some(Limits::new(a, b));
        self
    }

    pub fn lonlim(mut self, a: C, b: C) -> Self {
        self.lonlim = Some(Limits::new(a, b));
        self
    }

    /// Selects the extent of `points`, read according to `mode`.
    pub fn points(mut self, points: Vec<(C, C)>, mode: CoordMode) -> Self {
        self.points = Some((points, mode));
        self
    }

    pub fn buffer(mut self, buffer: Buffer) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn years(mut self, years: Vec<u16>) -> Self {
        self.years = Some(years);
        self
    }

    pub fn geo_output(mut self, geo_output: bool) -> Self {
        self.geo_output = geo_output;
        self
    }

    pub fn geo_warn_cells(mut self, cells: usize) -> Self {
        self.geo_warn_cells = cells;
        self
    }

    pub fn progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(&self, store: &MosaicStore) -> Result<Grid, ItsLiveError> {
        let region = self.region.ok_or(ItsLiveError::Builder("region"))?;
        let variable = self.variable.as_deref().ok_or(ItsLiveError::Builder("variable"))?;
        let years = match &self.years {
            None => vec![0],
            Some(years) if years.is_empty() => {
                return Err(ItsLiveError::Selector("empty year list".to_owned()))
            }
            Some(years) => years.clone(),
        };

        let (xlim, ylim) = match self.selector()? {
            Selector::Whole => (None, None),
            Selector::Native { xlim, ylim } => (xlim, ylim),
            Selector::Geographic { latlim, lonlim } => {
                let (xlim, ylim) = geographic_extent(store, region, latlim, lonlim)?;
                (Some(xlim), Some(ylim))
            }
            Selector::Points(points, mode) => {
                let native = to_native(store, region, &points, mode)?;
                let xlim = Limits::covering(native.iter().map(|c| c.x));
                let ylim = Limits::covering(native.iter().map(|c| c.y));
                match (xlim, ylim) {
                    (Some(xlim), Some(ylim)) => (Some(xlim), Some(ylim)),
                    _ => return Err(ItsLiveError::Selector("no finite points".to_owned())),
                }
            }
        };

        let progress = self.progress.unwrap_or(&Silent);
        let mut grid = load_native(
            store,
            region,
            variable,
            (xlim, ylim),
            self.buffer,
            &years,
            progress,
        )?;
        if self.geo_output {
            grid.coords =
                geographic_coords(store, region, &grid.coords, self.geo_warn_cells, progress)?;
        }
        Ok(grid)
    }
}

/// Private API.
impl<'a> GridQueryBuilder<'a> {
    fn selector(&self) -> Result<Selector, ItsLiveError> {
        let native = self.xlim.is_some() || self.ylim.is_some();
        let geographic = self.latlim.is_some() || self.lonlim.is_some();
        match (native, geographic, self.points.as_ref()) {
            (true, true, _) => Err(ItsLiveError::Selector(
                "xlim/ylim and latlim/lonlim are mutually exclusive".to_owned(),
            )),
            (true, false, Some(_)) | (false, true, Some(_)) => Err(ItsLiveError::Selector(
                "points and limits are mutually exclusive".to_owned(),
            )),
            (false, false, None) => Ok(Selector::Whole),
            (false, false, Some((points, mode))) => Ok(Selector::Points(points.clone(), *mode)),
            (true, false, None) => Ok(Selector::Native {
                xlim: self.xlim,
                ylim: self.ylim,
            }),
            (false, true, None) => match (self.latlim, self.lonlim) {
                (Some(latlim), Some(lonlim)) => Ok(Selector::Geographic { latlim, lonlim }),
                _ => Err(ItsLiveError::Selector(
                    "latlim and lonlim must be given together".to_owned(),
                )),
            },
        }
    }
}

/// Converts user pairs to native coordinates.
pub(crate) fn to_native(
    store: &MosaicStore,
    region: &Region,
    pairs: &[(C, C)],
    mode: CoordMode,
) -> Result<Vec<Coord<C>>, ItsLiveError> {
    if mode.is_geographic(pairs) {
        pairs
            .iter()
            .map(|&(lat, lon)| store.transform().forward(region, lat, lon))
            .collect()
    } else {
        Ok(pairs.iter().map(|&(x, y)| Coord { x, y }).collect())
    }
}

/// Native bounding box of a lat/lon box, from points sampled along its
/// edges.
fn geographic_extent(
    store: &MosaicStore,
    region: &Region,
    latlim: Limits,
    lonlim: Limits,
) -> Result<(Limits, Limits), ItsLiveError> {
    let lats: Vec<C> = linspace(latlim.min, latlim.max, EDGE_SAMPLES).collect();
    let lons: Vec<C> = linspace(lonlim.min, lonlim.max, EDGE_SAMPLES).collect();
    let edges = lats
        .iter()
        .flat_map(|&lat| [(lat, lonlim.min), (lat, lonlim.max)])
        .chain(lons.iter().flat_map(|&lon| [(latlim.min, lon), (latlim.max, lon)]));
    let mut native = Vec::with_capacity(4 * EDGE_SAMPLES);
    for (lat, lon) in edges {
        native.push(store.transform().forward(region, lat, lon)?);
    }
    let xlim = Limits::covering(native.iter().map(|c| c.x));
    let ylim = Limits::covering(native.iter().map(|c| c.y));
    xlim.zip(ylim)
        .ok_or_else(|| ItsLiveError::Selector("degenerate lat/lon box".to_owned()))
}

/// Loads the buffered native extent of `variable` for every year.
///
/// Reports a [`ProgressEvent::Load`] per year and stops between years
/// when the sink cancels.
pub(crate) fn load_native(
    store: &MosaicStore,
    region: &'static Region,
    variable: &str,
    (xlim, ylim): (Option<Limits>, Option<Limits>),
    buffer: Buffer,
    years: &[u16],
    progress: &dyn Progress,
) -> Result<Grid, ItsLiveError> {
    let total = years.len();
    progress.update(ProgressEvent::Load { done: 0, total })?;
    let reference_year = *years
        .first()
        .ok_or_else(|| ItsLiveError::Selector("empty year list".to_owned()))?;
    let reference = store.open(region, reference_year)?;
    let kind = reference.variable(variable)?.kind();
    let (x, y) = (reference.axis(Axis::X), reference.axis(Axis::Y));
    let window = subset::resolve(x, y, xlim, ylim, buffer)?;
    let south_up = y.len() > 1 && y[1] > y[0];

    let (rows, cols) = window.shape();
    let mut values = match kind {
        VariableKind::Continuous => {
            Values::Continuous(Array3::from_elem((rows, cols, total), f32::NAN))
        }
        VariableKind::Mask => Values::Mask(Array3::from_elem((rows, cols, total), false)),
    };

    for (slot, &year) in years.iter().enumerate() {
        let mosaic = store.open(region, year)?;
        let year_y = mosaic.axis(Axis::Y);
        // Slots may be stored in either row order over the same grid.
        let flipped = match (mosaic.axis(Axis::X) == x, year_y == y) {
            (true, true) => false,
            (true, false) if year_y.iter().rev().eq(y.iter()) => true,
            _ => {
                return Err(ItsLiveError::GridMismatch {
                    year,
                    reference: reference_year,
                })
            }
        };
        let rows = if flipped {
            let last = y.len() - 1;
            (last - window.rows.end())..=(last - window.rows.start())
        } else {
            window.rows.clone()
        };
        let var = mosaic.variable(variable)?;
        let mut raw = mosaic.read_window(variable, rows, window.cols.clone())?;
        if south_up != flipped {
            raw.invert_axis(NdAxis(0));
        }
        match &mut values {
            Values::Continuous(stack) => {
                stack.slice_mut(s![.., .., slot]).zip_mut_with(&raw, |o, &v| {
                    *o = if var.is_fill(v) { f32::NAN } else { v };
                });
            }
            Values::Mask(stack) => {
                stack.slice_mut(s![.., .., slot]).zip_mut_with(&raw, |o, &v| {
                    *o = v != 0.0 && !v.is_nan() && !var.is_fill(v);
                });
            }
        }
        debug!("loaded {variable} {year} window {window:?}");
        progress.update(ProgressEvent::Load {
            done: slot + 1,
            total,
        })?;
    }

    let x_axis = x[window.cols.clone()].to_vec();
    let mut y_axis = y[window.rows.clone()].to_vec();
    if south_up {
        y_axis.reverse();
    }

    Ok(Grid {
        region,
        variable: variable.to_owned(),
        kind,
        years: years.to_vec(),
        values,
        coords: GridCoords::Native { x: x_axis, y: y_axis },
        window,
    })
}

fn geographic_coords(
    store: &MosaicStore,
    region: &Region,
    coords: &GridCoords,
    warn_cells: usize,
    progress: &dyn Progress,
) -> Result<GridCoords, ItsLiveError> {
    let GridCoords::Native { x, y } = coords else {
        return Ok(coords.clone());
    };
    let (rows, cols) = (y.len(), x.len());
    let cells = rows * cols;
    if cells > warn_cells {
        warn!("converting {cells} cells to geographic coordinates, this may be slow");
        progress.update(ProgressEvent::LargeGeographicGrid { cells })?;
    }
    let transform = store.transform();
    let latlon = (0..cells)
        .into_par_iter()
        .map(|i| transform.inverse(region, Coord { x: x[i % cols], y: y[i / cols] }))
        .collect::<Result<Vec<_>, _>>()?;
    let (lat, lon): (Vec<C>, Vec<C>) = latlon.into_iter().unzip();
    let shape = (rows, cols);
    Ok(GridCoords::Geographic {
        lat: Array2::from_shape_vec(shape, lat).map_err(|e| ItsLiveError::Selector(e.to_string()))?,
        lon: Array2::from_shape_vec(shape, lon).map_err(|e| ItsLiveError::Selector(e.to_string()))?,
    })
}
