//! Coordinate transforms between geographic and region-native
//! coordinates.
//!
//! Only the handful of projections used by ITS_LIVE mosaics are
//! supported, all on the WGS84 datum. The math is done by `proj4rs`.

mod projector;

use crate::{ItsLiveError, Region, C};
use geo::geometry::Coord;
use projector::Projector;

/// Projection of a region's mosaics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// EPSG:3413, NSIDC Sea Ice Polar Stereographic North.
    NorthPolarStereographic,

    /// EPSG:3031, Antarctic Polar Stereographic.
    SouthPolarStereographic,

    /// ESRI:102027, Asia North Albers Equal Area Conic.
    AsiaAlbers,

    /// EPSG:32718, WGS 84 / UTM zone 18S.
    Utm18South,
}

impl Projection {
    pub const ALL: [Self; 4] = [
        Self::NorthPolarStereographic,
        Self::SouthPolarStereographic,
        Self::AsiaAlbers,
        Self::Utm18South,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::NorthPolarStereographic => "EPSG:3413",
            Self::SouthPolarStereographic => "EPSG:3031",
            Self::AsiaAlbers => "ESRI:102027",
            Self::Utm18South => "EPSG:32718",
        }
    }

    /// PROJ definition of [`Projection::code`].
    pub fn proj_string(&self) -> &'static str {
        match self {
            Self::NorthPolarStereographic => concat!(
                "+proj=stere +lat_0=90 +lat_ts=70 +lon_0=-45 +k=1 +x_0=0 +y_0=0 ",
                "+datum=WGS84 +units=m +no_defs"
            ),
            Self::SouthPolarStereographic => concat!(
                "+proj=stere +lat_0=-90 +lat_ts=-71 +lon_0=0 +k=1 +x_0=0 +y_0=0 ",
                "+datum=WGS84 +units=m +no_defs"
            ),
            Self::AsiaAlbers => concat!(
                "+proj=aea +lat_0=30 +lon_0=95 +lat_1=15 +lat_2=65 +x_0=0 +y_0=0 ",
                "+datum=WGS84 +units=m +no_defs"
            ),
            Self::Utm18South => "+proj=utm +zone=18 +south +datum=WGS84 +units=m +no_defs",
        }
    }

    /// Projects geographic `lat`, `lon` (degrees) to native meters.
    ///
    /// Longitudes in `(180, 360]` are wrapped to `(-180, 0]`. Parses
    /// the projection on every call, prefer a [`RegionTransform`] for
    /// bulk work.
    pub fn forward(&self, lat: C, lon: C) -> Result<Coord<C>, ItsLiveError> {
        let lon = check_geographic(lat, lon)?;
        Projector::new(*self)?.forward(lat, lon)
    }

    /// Inverse of [`Projection::forward`], returning `(lat, lon)` in
    /// degrees with longitude in `[-180, 180]`.
    pub fn inverse(&self, xy: Coord<C>) -> Result<(C, C), ItsLiveError> {
        check_native(xy)?;
        let (lat, lon) = Projector::new(*self)?.inverse(xy)?;
        Ok((lat, wrap_lon(lon)))
    }
}

/// Converts between geographic and region-native coordinates.
///
/// The store owns one of these and everything that accepts geographic
/// input goes through it.
pub trait CoordinateTransform: Send + Sync {
    /// `(lat, lon)` degrees to native `(x, y)` meters.
    fn forward(&self, region: &Region, lat: C, lon: C) -> Result<Coord<C>, ItsLiveError>;

    /// Native `(x, y)` meters to `(lat, lon)` degrees.
    fn inverse(&self, region: &Region, xy: Coord<C>) -> Result<(C, C), ItsLiveError>;
}

/// Transforms using each region's built-in [`Projection`], parsed
/// once up front.
#[derive(Debug)]
pub struct RegionTransform {
    projectors: Vec<Projector>,
}

impl RegionTransform {
    pub fn new() -> Result<Self, ItsLiveError> {
        let projectors = Projection::ALL
            .into_iter()
            .map(Projector::new)
            .collect::<Result<_, _>>()?;
        Ok(Self { projectors })
    }

    fn projector(&self, projection: Projection) -> Result<&Projector, ItsLiveError> {
        self.projectors
            .iter()
            .find(|p| p.projection() == projection)
            .ok_or_else(|| ItsLiveError::Projection(format!("{} not loaded", projection.code())))
    }
}

impl CoordinateTransform for RegionTransform {
    fn forward(&self, region: &Region, lat: C, lon: C) -> Result<Coord<C>, ItsLiveError> {
        let lon = check_geographic(lat, lon)?;
        self.projector(region.projection)?.forward(lat, lon)
    }

    fn inverse(&self, region: &Region, xy: Coord<C>) -> Result<(C, C), ItsLiveError> {
        check_native(xy)?;
        let (lat, lon) = self.projector(region.projection)?.inverse(xy)?;
        Ok((lat, wrap_lon(lon)))
    }
}

/// How to interpret user supplied coordinate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordMode {
    /// Guess with [`looks_geographic`].
    #[default]
    Auto,

    /// Pairs are native `(x, y)` meters.
    Native,

    /// Pairs are `(lat, lon)` degrees.
    Geographic,
}

impl CoordMode {
    /// Returns true if `pairs` are to be read as `(lat, lon)`.
    pub fn is_geographic(self, pairs: &[(C, C)]) -> bool {
        match self {
            Self::Auto => looks_geographic(pairs),
            Self::Native => false,
            Self::Geographic => true,
        }
    }
}

/// Returns true if every pair could be a `(lat, lon)`: `|lat| <= 90`
/// and `lon` in `[-180, 360]`.
///
/// This is ambiguous by nature. Native coordinates within a few
/// hundred meters of a projection origin satisfy the same bounds, so
/// callers that know better should use [`CoordMode::Native`] or
/// [`CoordMode::Geographic`]. An empty slice is not geographic.
pub fn looks_geographic(pairs: &[(C, C)]) -> bool {
    !pairs.is_empty()
        && pairs
            .iter()
            .all(|&(lat, lon)| lat.abs() <= 90.0 && (-180.0..=360.0).contains(&lon))
}

/// Validates `lat`, `lon` and returns `lon` wrapped to `[-180, 180]`.
fn check_geographic(lat: C, lon: C) -> Result<C, ItsLiveError> {
    if !lat.is_finite() || lat.abs() > 90.0 {
        return Err(ItsLiveError::OutOfRange(format!(
            "latitude {lat} outside [-90, 90]"
        )));
    }
    if !lon.is_finite() || !(-180.0..=360.0).contains(&lon) {
        return Err(ItsLiveError::OutOfRange(format!(
            "longitude {lon} outside [-180, 360]"
        )));
    }
    Ok(if lon > 180.0 { lon - 360.0 } else { lon })
}

fn check_native(Coord { x, y }: Coord<C>) -> Result<(), ItsLiveError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(ItsLiveError::OutOfRange(format!(
            "non-finite native coordinate ({x}, {y})"
        )))
    }
}

fn wrap_lon(lon: C) -> C {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::{looks_geographic, CoordMode, CoordinateTransform, Projection, RegionTransform};
    use crate::{ItsLiveError, Region};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_alaska_forward() {
        let ala = Region::from_id(1).unwrap();
        let transform = RegionTransform::new().unwrap();
        let xy = transform.forward(ala, 60.08343, -140.46707).unwrap();
        assert_abs_diff_eq!(xy.x, -3_298_427.76, epsilon = 0.5);
        assert_abs_diff_eq!(xy.y, 315_689.27, epsilon = 0.5);
        let (lat, lon) = transform.inverse(ala, xy).unwrap();
        assert_abs_diff_eq!(lat, 60.08343, epsilon = 1e-6);
        assert_abs_diff_eq!(lon, -140.46707, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip_every_region() {
        let cases = [
            (
                Projection::NorthPolarStereographic,
                [(78.9, 16.0), (64.5, -18.0), (89.99, 120.0)],
            ),
            (
                Projection::SouthPolarStereographic,
                [(-75.0, -100.0), (-66.5, 140.0), (-89.99, 0.5)],
            ),
            (Projection::AsiaAlbers, [(28.0, 86.9), (36.0, 75.0), (42.5, 80.0)]),
            (
                Projection::Utm18South,
                [(-50.0, -73.5), (-46.5, -73.2), (-54.0, -70.0)],
            ),
        ];
        for (projection, points) in cases {
            for (lat, lon) in points {
                let xy = projection.forward(lat, lon).unwrap();
                let (lat2, lon2) = projection.inverse(xy).unwrap();
                assert_abs_diff_eq!(lat, lat2, epsilon = 1e-3);
                assert_abs_diff_eq!(lon, lon2, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_known_points() {
        // South pole is the origin of EPSG:3031.
        let pole = Projection::SouthPolarStereographic.forward(-90.0, 0.0).unwrap();
        assert_abs_diff_eq!(pole.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pole.y, 0.0, epsilon = 1e-6);

        // On EPSG:3031, longitude 0 lies on +y and 90E on +x.
        let lon0 = Projection::SouthPolarStereographic.forward(-71.0, 0.0).unwrap();
        assert!(lon0.y > 0.0 && lon0.x.abs() < 1e-6);
        let lon90 = Projection::SouthPolarStereographic.forward(-71.0, 90.0).unwrap();
        assert!(lon90.x > 0.0 && lon90.y.abs() < 1e-6);

        // Central meridian of UTM 18 maps to the false easting.
        let cm = Projection::Utm18South.forward(-45.0, -75.0).unwrap();
        assert_abs_diff_eq!(cm.x, 500_000.0, epsilon = 1e-6);
        assert!(cm.y < 10_000_000.0);

        // Origin of the Asia Albers projection.
        let origin = Projection::AsiaAlbers.forward(30.0, 95.0).unwrap();
        assert_abs_diff_eq!(origin.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(origin.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_longitude_wrap() {
        let p = Projection::NorthPolarStereographic;
        let a = p.forward(70.0, 219.5).unwrap();
        let b = p.forward(70.0, -140.5).unwrap();
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-6);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_range() {
        let p = Projection::NorthPolarStereographic;
        assert!(matches!(p.forward(90.5, 0.0), Err(ItsLiveError::OutOfRange(_))));
        assert!(matches!(p.forward(60.0, -181.0), Err(ItsLiveError::OutOfRange(_))));
        assert!(matches!(p.forward(60.0, 360.5), Err(ItsLiveError::OutOfRange(_))));
        assert!(p.forward(90.0, 360.0).is_ok());
        assert!(p.inverse(geo::coord! { x: f64::NAN, y: 0.0 }).is_err());
    }

    #[test]
    fn test_geographic_heuristic_boundaries() {
        assert!(looks_geographic(&[(90.0, 360.0), (-90.0, -180.0)]));
        assert!(!looks_geographic(&[(90.0001, 0.0)]));
        assert!(!looks_geographic(&[(0.0, 360.0001)]));
        assert!(!looks_geographic(&[(0.0, -180.0001)]));
        assert!(!looks_geographic(&[(60.0, -140.0), (-3_298_427.0, 315_689.0)]));
        assert!(!looks_geographic(&[]));

        // Native meters near a projection origin are indistinguishable,
        // hence the explicit modes.
        let near_origin = [(45.0, 120.0)];
        assert!(CoordMode::Auto.is_geographic(&near_origin));
        assert!(!CoordMode::Native.is_geographic(&near_origin));
        assert!(CoordMode::Geographic.is_geographic(&[(1e6, 1e6)]));
    }
}
