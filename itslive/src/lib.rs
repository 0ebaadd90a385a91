//! Access to ITS_LIVE glacier velocity mosaics.
//!
//! A [`MosaicStore`] resolves `(region, year)` to a mosaic on disk and
//! caches open handles. On top of it:
//!
//! - [`GridQuery`] loads a gridded subset of one variable for one or
//!   more year slots,
//! - [`Interp`] samples variables, or along/across-track velocity, at
//!   arbitrary points,
//! - [`FlowlineQuery`] traces flowlines through the summary velocity
//!   field,
//! - [`Displacement`] advects points forward or backward in time.
//!
//! Coordinates are native projected meters of the region's projection
//! unless a query says otherwise. Velocities are m/yr and buffers are
//! kilometers.
//!
//! # Example
//!
//! ```no_run
//! use itslive::{CoordMode, Interp, MosaicStore, Region, StoreConfig};
//!
//! # fn main() -> Result<(), itslive::ItsLiveError> {
//! let store = MosaicStore::new(StoreConfig::new("/data/itslive"))?;
//! let speed = Interp::builder()
//!     .region(Region::lookup("ALA")?)
//!     .variable("v")
//!     .points(vec![(60.08343, -140.46707)], CoordMode::Geographic)
//!     .build(&store)?;
//! println!("{:?}", speed.squeeze());
//! # Ok(())
//! # }
//! ```

mod displacement;
mod error;
mod field;
mod flowline;
mod interp;
mod loader;
mod math;
pub mod progress;
pub mod projection;
mod region;
mod store;
pub mod subset;
pub mod time;

#[cfg(test)]
mod testdata;

pub use crate::{
    displacement::{
        Displaced, Displacement, DisplacementBuilder, DEFAULT_WINDOW_KM, MAX_ITERATIONS, MAX_YEARS,
    },
    error::ItsLiveError,
    field::Screening,
    flowline::{Flowline, FlowlineBuilder, FlowlineQuery, Flowlines, StreamOptions},
    interp::{Interp, InterpBuilder, InterpValues, Interpolated, Method, Quantity, Sample, Squeezed},
    loader::{Grid, GridCoords, GridQuery, GridQueryBuilder, Values, DEFAULT_GEO_WARN_CELLS},
    progress::{Cancelled, Progress, ProgressEvent, Silent},
    projection::{CoordMode, CoordinateTransform, Projection, RegionTransform},
    region::{Region, REGIONS},
    store::{
        MosaicStore, StoreConfig, DEFAULT_CACHE_BUDGET_BYTES, DEFAULT_EXTENSION,
        DEFAULT_PRODUCT_TAG,
    },
    subset::{Buffer, Limits, Window},
};
pub use geo;
pub use mosaic;

/// Coordinate and velocity scalar.
pub type C = f64;
