//! Flowline tracing through velocity mosaics.
//!
//! Each seed is traced upstream and downstream along the unit
//! direction of the velocity field with an adaptive Bogacki-Shampine
//! 3(2) pair, trimmed to the contiguous run of moving ice around the
//! seed, and resampled to uniform arc length with PCHIP.

use crate::{
    field::{Screening, VelocityField},
    loader::to_native,
    math::{bogacki_shampine, linspace, Pchip},
    progress::{Progress, ProgressEvent, Silent},
    projection::CoordMode,
    subset::{Buffer, Limits},
    ItsLiveError, MosaicStore, Region, C,
};
use geo::geometry::Coord;
use log::{debug, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Below this speed (m/yr) the field has no usable direction.
const STAGNATION_SPEED: C = 1e-3;

/// Halvings used to locate a min_speed crossing within one step.
const CROSSING_BISECTIONS: usize = 40;

/// Integrator settings. Step sizes and tolerance are in grid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamOptions {
    pub initial_step: C,
    pub min_step: C,
    pub max_step: C,

    /// Per-step error bound.
    pub tolerance: C,

    /// Maximum length of each branch (meters), the window buffer if
    /// unset.
    pub max_length: Option<C>,

    /// Maximum step attempts per branch.
    pub max_steps: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.25,
            min_step: 0.01,
            max_step: 1.0,
            tolerance: 1e-3,
            max_length: None,
            max_steps: 200_000,
        }
    }
}

/// One traced flowline.
///
/// `distance` is signed arc length from the seed (or from the
/// grounding line when requested): negative upstream, positive
/// downstream, strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Flowline {
    /// Native seed position.
    pub seed: Coord<C>,
    pub x: Vec<C>,
    pub y: Vec<C>,
    pub distance: Vec<C>,

    /// Speed (m/yr) at each vertex, when requested.
    pub speed: Option<Vec<C>>,
}

impl Flowline {
    fn empty(seed: Coord<C>, with_speed: bool) -> Self {
        Self {
            seed,
            x: Vec::new(),
            y: Vec::new(),
            distance: Vec::new(),
            speed: with_speed.then(Vec::new),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Flowlines for a batch of seeds, flattened when there is only one.
#[derive(Debug, Clone, PartialEq)]
pub enum Flowlines {
    One(Flowline),
    Many(Vec<Flowline>),
}

impl Flowlines {
    pub fn into_vec(self) -> Vec<Flowline> {
        match self {
            Self::One(line) => vec![line],
            Self::Many(lines) => lines,
        }
    }
}

pub struct FlowlineQuery;

impl FlowlineQuery {
    pub fn builder<'a>() -> FlowlineBuilder<'a> {
        FlowlineBuilder {
            region: None,
            seeds: None,
            spacing_m: 10.0,
            buffer_km: 1000.0,
            min_speed: 1.0,
            screening: None,
            year: 0,
            grounding_line: false,
            with_speed: false,
            stream: StreamOptions::default(),
            progress: None,
        }
    }
}

pub struct FlowlineBuilder<'a> {
    region: Option<&'static Region>,

    seeds: Option<(Vec<(C, C)>, CoordMode)>,

    /// Resampled vertex spacing (meters).
    spacing_m: C,

    /// Velocity window around the seeds (kilometers).
    buffer_km: C,

    /// Vertices at or below this speed (m/yr) end the flowline.
    min_speed: C,

    screening: Option<Screening>,

    /// Year slot of the velocity field, 0 (summary) by default.
    year: u16,

    /// Measure distance from the last grounded vertex.
    grounding_line: bool,

    with_speed: bool,

    stream: StreamOptions,

    progress: Option<&'a dyn Progress>,
}

impl<'a> FlowlineBuilder<'a> {
    pub fn region(mut self, region: &'static Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn seeds(mut self, seeds: Vec<(C, C)>, mode: CoordMode) -> Self {
        self.seeds = Some((seeds, mode));
        self
    }

    pub fn spacing(mut self, meters: C) -> Self {
        self.spacing_m = meters;
        self
    }

    pub fn buffer(mut self, km: C) -> Self {
        self.buffer_km = km;
        self
    }

    pub fn min_speed(mut self, speed: C) -> Self {
        self.min_speed = speed;
        self
    }

    pub fn screening(mut self, screening: Screening) -> Self {
        self.screening = Some(screening);
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn grounding_line(mut self, reference: bool) -> Self {
        self.grounding_line = reference;
        self
    }

    pub fn with_speed(mut self, with_speed: bool) -> Self {
        self.with_speed = with_speed;
        self
    }

    pub fn stream(mut self, options: StreamOptions) -> Self {
        self.stream = options;
        self
    }

    pub fn progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(&self, store: &MosaicStore) -> Result<Flowlines, ItsLiveError> {
        let region = self.region.ok_or(ItsLiveError::Builder("region"))?;
        let (pairs, mode) = self.seeds.as_ref().ok_or(ItsLiveError::Builder("seeds"))?;
        if pairs.is_empty() {
            return Err(ItsLiveError::Selector("no seed points".to_owned()));
        }
        if !(self.spacing_m.is_finite() && self.spacing_m > 0.0) {
            return Err(ItsLiveError::Selector(format!(
                "spacing must be positive, got {}",
                self.spacing_m
            )));
        }
        if !(self.buffer_km.is_finite() && self.buffer_km >= 0.0) {
            return Err(ItsLiveError::Selector(format!(
                "buffer must be non-negative, got {}",
                self.buffer_km
            )));
        }
        let stream = &self.stream;
        if !(stream.min_step > 0.0
            && stream.min_step <= stream.max_step
            && stream.tolerance > 0.0)
        {
            return Err(ItsLiveError::Selector(format!(
                "step bounds must satisfy 0 < min <= max with positive tolerance, got {stream:?}"
            )));
        }
        let seeds = to_native(store, region, pairs, *mode)?;

        let progress = self.progress.unwrap_or(&Silent);
        let xlim = Limits::covering(seeds.iter().map(|s| s.x));
        let ylim = Limits::covering(seeds.iter().map(|s| s.y));
        let field = match xlim.zip(ylim) {
            Some((xlim, ylim)) => match VelocityField::load(
                store,
                region,
                self.year,
                xlim,
                ylim,
                Buffer::Uniform(self.buffer_km),
                self.screening.as_ref(),
                self.grounding_line,
                progress,
            ) {
                Ok(field) => Some(field),
                Err(ItsLiveError::NoData) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let total = seeds.len();
        let done = AtomicUsize::new(0);
        let mut lines = seeds
            .par_iter()
            .map(|&seed| {
                let line = match &field {
                    Some(field) => self.trace(field, seed),
                    None => {
                        warn!("seed {seed:?} is outside the velocity mosaic");
                        Flowline::empty(seed, self.with_speed)
                    }
                };
                let done = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.update(ProgressEvent::Seed { done, total })?;
                Ok(line)
            })
            .collect::<Result<Vec<_>, ItsLiveError>>()?;

        if lines.len() == 1 {
            if let Some(line) = lines.pop() {
                return Ok(Flowlines::One(line));
            }
        }
        Ok(Flowlines::Many(lines))
    }
}

/// Private API.
impl<'a> FlowlineBuilder<'a> {
    fn trace(&self, field: &VelocityField, seed: Coord<C>) -> Flowline {
        let empty = || Flowline::empty(seed, self.with_speed);
        if field.speed(seed).partial_cmp(&self.min_speed) != Some(std::cmp::Ordering::Greater) {
            warn!("seed {seed:?} has no usable velocity, returning an empty flowline");
            return empty();
        }

        let cell = field.cell_size();
        let max_length = self.stream.max_length.unwrap_or(self.buffer_km * 1000.0);
        let tracer = Tracer {
            field,
            h_initial: self.stream.initial_step * cell,
            h_min: self.stream.min_step * cell,
            h_max: self.stream.max_step * cell,
            tolerance: self.stream.tolerance * cell,
            max_length,
            max_steps: self.stream.max_steps,
        };
        let (upstream, up_stop) = tracer.branch(seed, -1.0);
        let (downstream, down_stop) = tracer.branch(seed, 1.0);
        debug!(
            "seed {seed:?}; upstream: {} vertices ({up_stop:?}), \
             downstream: {} vertices ({down_stop:?})",
            upstream.len(),
            downstream.len()
        );

        let mut path: Vec<Coord<C>> = upstream.into_iter().rev().collect();
        let mut seed_index = path.len();
        path.push(seed);
        path.extend(downstream);

        // Keep the run of moving ice around the seed, ending each side
        // on the min_speed crossing rather than the last moving vertex.
        let moving = |p: &Coord<C>| field.speed(*p) > self.min_speed;
        let crossing = |mut inside: Coord<C>, mut outside: Coord<C>| {
            for _ in 0..CROSSING_BISECTIONS {
                let mid = (inside + outside) / 2.0;
                if moving(&mid) {
                    inside = mid;
                } else {
                    outside = mid;
                }
            }
            inside
        };
        let start = path[..seed_index]
            .iter()
            .rposition(|p| !moving(p))
            .map_or(0, |i| i + 1);
        let end = path[seed_index..]
            .iter()
            .position(|p| !moving(p))
            .map_or(path.len(), |i| seed_index + i);
        let head = (start > 0).then(|| crossing(path[start], path[start - 1]));
        let tail = (end < path.len()).then(|| crossing(path[end - 1], path[end]));
        path.truncate(end);
        path.extend(tail);
        path.drain(..start);
        seed_index -= start;
        if let Some(head) = head {
            path.insert(0, head);
            seed_index += 1;
        }

        // Drop repeated vertices, cumulative distance must be strictly
        // increasing.
        let mut kept: Vec<Coord<C>> = Vec::with_capacity(path.len());
        let mut cumulative: Vec<C> = Vec::with_capacity(path.len());
        let mut kept_seed = 0;
        for (i, p) in path.into_iter().enumerate() {
            match (kept.last(), cumulative.last()) {
                (Some(last), Some(&s)) => {
                    let step = (p.x - last.x).hypot(p.y - last.y);
                    if step > 0.0 {
                        kept.push(p);
                        cumulative.push(s + step);
                    }
                }
                _ => {
                    kept.push(p);
                    cumulative.push(0.0);
                }
            }
            if i == seed_index {
                kept_seed = kept.len() - 1;
            }
        }
        let origin = cumulative[kept_seed];
        for s in &mut cumulative {
            *s -= origin;
        }

        let (x, y, mut distance) = self.resample(&kept, cumulative);
        if self.grounding_line {
            let grounded = x
                .iter()
                .zip(&y)
                .rposition(|(&x, &y)| field.grounded(Coord { x, y }) == Some(true));
            match grounded {
                Some(i) => {
                    let shift = distance[i];
                    for d in &mut distance {
                        *d -= shift;
                    }
                }
                None => {
                    warn!("flowline from {seed:?} never crosses grounded ice, keeping seed origin")
                }
            }
        }
        let speed = self.with_speed.then(|| {
            x.iter()
                .zip(&y)
                .map(|(&x, &y)| field.speed(Coord { x, y }))
                .collect()
        });

        Flowline {
            seed,
            x,
            y,
            distance,
            speed,
        }
    }

    /// Resamples the path to `spacing_m` on a grid anchored at
    /// distance 0.
    fn resample(&self, path: &[Coord<C>], cumulative: Vec<C>) -> (Vec<C>, Vec<C>, Vec<C>) {
        let (first, last) = match (cumulative.first(), cumulative.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return (Vec::new(), Vec::new(), Vec::new()),
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (n_up, n_down) = (
            (-first / self.spacing_m + 1e-9).floor() as usize,
            (last / self.spacing_m + 1e-9).floor() as usize,
        );
        #[allow(clippy::cast_precision_loss)]
        let distance: Vec<C> = linspace(0.0, -(n_up as C) * self.spacing_m, n_up + 1)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .chain(linspace(0.0, n_down as C * self.spacing_m, n_down + 1).skip(1))
            .collect();

        let xs = path.iter().map(|p| p.x).collect();
        let ys = path.iter().map(|p| p.y).collect();
        match (Pchip::new(cumulative.clone(), xs), Pchip::new(cumulative, ys)) {
            (Some(px), Some(py)) => {
                let x = distance.iter().map(|&d| px.eval(d)).collect();
                let y = distance.iter().map(|&d| py.eval(d)).collect();
                (x, y, distance)
            }
            _ => (Vec::new(), Vec::new(), Vec::new()),
        }
    }
}

/// Why a branch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Left the window or hit an untraversable cell.
    Edge,
    /// Flow direction turned back on itself.
    Reversal,
    MaxLength,
    MaxSteps,
}

struct Tracer<'f> {
    field: &'f VelocityField,
    h_initial: C,
    h_min: C,
    h_max: C,
    tolerance: C,
    max_length: C,
    max_steps: usize,
}

impl<'f> Tracer<'f> {
    /// Unit direction of flow at `p`, scaled by `sign`.
    fn direction(&self, p: Coord<C>, sign: C) -> Option<Coord<C>> {
        let v = self.field.velocity(p)?;
        let speed = v.x.hypot(v.y);
        (speed >= STAGNATION_SPEED).then(|| v * (sign / speed))
    }

    /// Traces from `seed` (excluded) in direction `sign`.
    fn branch(&self, seed: Coord<C>, sign: C) -> (Vec<Coord<C>>, Stop) {
        let mut f = |p| self.direction(p, sign);
        let mut points = Vec::new();
        let Some(mut slope) = f(seed) else {
            return (points, Stop::Edge);
        };
        let mut p = seed;
        let mut h = self.h_initial.clamp(self.h_min, self.h_max);
        let mut length = 0.0;

        for _ in 0..self.max_steps {
            let remaining = self.max_length - length;
            if remaining <= 0.0 {
                return (points, Stop::MaxLength);
            }
            let step_h = h.min(remaining);
            let Some(step) = bogacki_shampine(&mut f, p, slope, step_h) else {
                if h <= self.h_min {
                    return (points, Stop::Edge);
                }
                h = (h / 2.0).max(self.h_min);
                continue;
            };
            if step.error > self.tolerance && step_h > self.h_min {
                let shrunk = step_h * 0.9 * (self.tolerance / step.error).cbrt();
                h = shrunk.clamp(self.h_min, (step_h / 2.0).max(self.h_min));
                continue;
            }
            if step.slope.x * slope.x + step.slope.y * slope.y < 0.0 {
                return (points, Stop::Reversal);
            }
            p = step.end;
            slope = step.slope;
            length += step_h;
            points.push(p);

            let growth = if step.error > 0.0 {
                (0.9 * (self.tolerance / step.error).cbrt()).clamp(0.2, 5.0)
            } else {
                5.0
            };
            h = (step_h * growth).clamp(self.h_min, self.h_max);
        }
        (points, Stop::MaxSteps)
    }
}
