//! Grid geometry: one variant per grid template and the coordinate enumeration
//! honoring the scanning mode flags.

mod gaussian;
mod lambert;
mod latlon;
mod mercator;
mod polar;
mod scan;

use serde::Serialize;

use crate::grib::RecordError;

pub use gaussian::{gaussian_latitudes, GaussianGrid};
pub use lambert::LambertConformalGrid;
pub use latlon::{LatLonGrid, RotatedLatLonGrid};
pub use mercator::MercatorGrid;
pub use polar::PolarStereographicGrid;
pub use scan::{ScanOrder, ScanningMode};

/// Smallest closure tolerance applied to any grid, in degrees.
pub const MIN_TOLERANCE: f64 = 1e-6;

pub type Points<'a> = Box<dyn Iterator<Item = Coordinate> + 'a>;

/// Normalized geographic position: latitude clamped to [-90, 90],
/// longitude folded into [0, 360).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: normalize_lon(lon),
        }
    }

    /// Largest of the latitude and (wrapped) longitude differences, in degrees.
    pub fn distance_deg(&self, other: &Coordinate) -> f64 {
        let dlat = (self.lat - other.lat).abs();
        if self.lat.abs() == 90.0 && other.lat.abs() == 90.0 {
            return dlat;
        }
        let dlon = (self.lon - other.lon).abs();
        dlat.max(dlon.min(360.0 - dlon))
    }
}

pub(crate) fn normalize_lon(lon: f64) -> f64 {
    let lon = lon % 360.0;
    let lon = if lon < 0.0 { lon + 360.0 } else { lon };
    // -1e-15 % 360 + 360 rounds to 360
    if lon >= 360.0 {
        0.0
    } else {
        lon
    }
}

/// Longitude span from `lo1` to `lo2` walking in the scanning direction.
pub(crate) fn lon_span(lo1: f64, lo2: f64, negative: bool) -> f64 {
    let span = if negative { lo1 - lo2 } else { lo2 - lo1 };
    if span < 0.0 {
        span + 360.0
    } else {
        span
    }
}

/// A declared increment may only differ from the step spanning the first and
/// last points over `intervals` steps by the rounding of the encoded values:
/// half a unit for the increment, one unit shared by the two corners.
pub(crate) fn check_increment(
    axis: &str,
    declared: Option<f64>,
    step: f64,
    intervals: usize,
    resolution: f64,
) -> Result<(), RecordError> {
    let tolerance = resolution / 2.0 + resolution / intervals.max(1) as f64;
    match declared {
        Some(declared) if (declared - step).abs() > tolerance => {
            Err(RecordError::InconsistentGeometry(format!(
                "{} increment {} does not match the step {} between the first and last points",
                axis, declared, step
            )))
        }
        _ => Ok(()),
    }
}

/// Shape of the earth reduced to the sphere radius used by the projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Earth {
    pub shape: u8,
    pub radius: f64,
}

impl Earth {
    pub const GRIB1: Earth = Earth {
        shape: 0,
        radius: 6_367_470.0,
    };

    /// Code table 3.2. Ellipsoids are approximated by their semi-major axis.
    pub fn from_shape(
        shape: u8,
        radius: Option<f64>,
        major_axis: Option<f64>,
    ) -> Result<Self, RecordError> {
        let radius = match shape {
            0 => Some(6_367_470.0),
            1 => radius,
            2 => Some(6_378_160.0),
            3 => major_axis.map(|km| km * 1000.0),
            4 | 5 => Some(6_378_137.0),
            6 => Some(6_371_229.0),
            7 => major_axis,
            8 => Some(6_371_200.0),
            9 => Some(6_377_563.396),
            _ => None,
        };

        match radius {
            Some(radius) if radius > 0.0 => Ok(Self { shape, radius }),
            _ => Err(RecordError::UnsupportedTemplate {
                section: 3,
                template: shape as u16,
                reason: format!("earth shape {} without usable radius", shape),
            }),
        }
    }
}

/// Uniform access to the point geometry of a grid template.
pub trait GridPoints {
    fn num_points(&self) -> usize;

    /// Coordinates in data order, without any consistency check.
    fn points(&self) -> Result<Points<'_>, RecordError>;

    /// Computed and declared reference point plus the tolerance between them.
    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)>;

    /// Declared increments against the steps used for enumeration.
    fn check_increments(&self) -> Result<(), RecordError> {
        Ok(())
    }

    fn check(&self, min_tolerance: f64) -> Result<(), RecordError> {
        self.check_increments()?;
        if let Some((computed, declared, tolerance)) = self.closure() {
            let tolerance = tolerance.max(min_tolerance);
            let distance = computed.distance_deg(&declared);
            if !(distance <= tolerance) {
                return Err(RecordError::InconsistentGeometry(format!(
                    "enumeration ends at ({:.6}, {:.6}) but the grid declares ({:.6}, {:.6}), off by {:e} deg",
                    computed.lat, computed.lon, declared.lat, declared.lon, distance
                )));
            }
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<Points<'_>, RecordError> {
        self.check(MIN_TOLERANCE)?;
        self.points()
    }
}

/// Spectral representation; carries no point geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SphericalHarmonics {
    pub j: u32,
    pub k: u32,
    pub m: u32,
    pub representation_type: u8,
    pub representation_mode: u8,
}

impl GridPoints for SphericalHarmonics {
    fn num_points(&self) -> usize {
        (self.m as usize + 1) * (self.m as usize + 2)
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        Err(RecordError::UnsupportedTemplate {
            section: 3,
            template: 50,
            reason: String::from("spherical harmonics have no grid points"),
        })
    }

    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Grid {
    LatLon(LatLonGrid),
    RotatedLatLon(RotatedLatLonGrid),
    Gaussian(GaussianGrid),
    Mercator(MercatorGrid),
    LambertConformal(LambertConformalGrid),
    PolarStereographic(PolarStereographicGrid),
    SphericalHarmonics(SphericalHarmonics),
}

impl Grid {
    fn inner(&self) -> &dyn GridPoints {
        match self {
            Grid::LatLon(grid) => grid,
            Grid::RotatedLatLon(grid) => grid,
            Grid::Gaussian(grid) => grid,
            Grid::Mercator(grid) => grid,
            Grid::LambertConformal(grid) => grid,
            Grid::PolarStereographic(grid) => grid,
            Grid::SphericalHarmonics(grid) => grid,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Grid::LatLon(_) => "regular_ll",
            Grid::RotatedLatLon(_) => "rotated_ll",
            Grid::Gaussian(grid) if grid.pl.is_some() => "reduced_gg",
            Grid::Gaussian(_) => "regular_gg",
            Grid::Mercator(_) => "mercator",
            Grid::LambertConformal(_) => "lambert",
            Grid::PolarStereographic(_) => "polar_stereographic",
            Grid::SphericalHarmonics(_) => "sh",
        }
    }

    /// True latitude/longitude of every point; only rotated grids differ from
    /// [`GridPoints::enumerate`].
    pub fn geographic(&self) -> Result<Points<'_>, RecordError> {
        self.check(MIN_TOLERANCE)?;
        self.geographic_points()
    }

    pub(crate) fn geographic_points(&self) -> Result<Points<'_>, RecordError> {
        match self {
            Grid::RotatedLatLon(grid) => {
                let points = grid.points()?;
                Ok(Box::new(points.map(move |c| grid.unrotate(&c))))
            }
            _ => self.points(),
        }
    }
}

impl GridPoints for Grid {
    fn num_points(&self) -> usize {
        self.inner().num_points()
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        self.inner().points()
    }

    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        self.inner().closure()
    }

    fn check_increments(&self) -> Result<(), RecordError> {
        self.inner().check_increments()
    }
}
