//! `proj4rs` backed forward and inverse transforms.

use super::Projection;
use crate::{ItsLiveError, C};
use geo::geometry::Coord;
use proj4rs::{proj::Proj, transform::transform};

/// WGS84 longitude/latitude, in radians on the `proj4rs` side.
const GEOGRAPHIC: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A parsed native and geographic CRS pair for one [`Projection`].
pub(crate) struct Projector {
    projection: Projection,
    geographic: Proj,
    native: Proj,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("projection", &self.projection)
            .finish_non_exhaustive()
    }
}

impl Projector {
    pub(crate) fn new(projection: Projection) -> Result<Self, ItsLiveError> {
        let parse = |definition: &str| {
            Proj::from_proj_string(definition).map_err(|e| {
                ItsLiveError::Projection(format!("{}: {e:?}", projection.code()))
            })
        };
        Ok(Self {
            projection,
            geographic: parse(GEOGRAPHIC)?,
            native: parse(projection.proj_string())?,
        })
    }

    pub(crate) fn projection(&self) -> Projection {
        self.projection
    }

    /// Projects `lat`, `lon` (degrees, longitude in `[-180, 180]`) to
    /// native meters.
    pub(crate) fn forward(&self, lat: C, lon: C) -> Result<Coord<C>, ItsLiveError> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.geographic, &self.native, &mut point).map_err(|e| {
            ItsLiveError::OutOfRange(format!(
                "({lat}, {lon}) has no {} coordinate: {e:?}",
                self.projection.code()
            ))
        })?;
        let (x, y, _) = point;
        self.finite(x, y)?;
        Ok(Coord { x, y })
    }

    /// Native meters to `(lat, lon)` degrees.
    pub(crate) fn inverse(&self, Coord { x, y }: Coord<C>) -> Result<(C, C), ItsLiveError> {
        let mut point = (x, y, 0.0);
        transform(&self.native, &self.geographic, &mut point).map_err(|e| {
            ItsLiveError::OutOfRange(format!(
                "({x}, {y}) has no geographic coordinate in {}: {e:?}",
                self.projection.code()
            ))
        })?;
        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        self.finite(lat, lon)?;
        Ok((lat, lon))
    }

    fn finite(&self, a: C, b: C) -> Result<(), ItsLiveError> {
        if a.is_finite() && b.is_finite() {
            Ok(())
        } else {
            Err(ItsLiveError::OutOfRange(format!(
                "non-finite result in {}",
                self.projection.code()
            )))
        }
    }
}
