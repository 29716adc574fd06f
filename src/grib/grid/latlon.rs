use serde::Serialize;

use crate::grib::grid::{
    check_increment, lon_span, Coordinate, Earth, GridPoints, Points, ScanOrder, ScanningMode,
};
use crate::grib::RecordError;

/// Regular latitude/longitude grid (equidistant cylindrical, Plate Carree).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatLonGrid {
    pub earth: Earth,
    pub ni: usize,
    pub nj: usize,
    pub la1: f64,
    pub lo1: f64,
    pub la2: f64,
    pub lo2: f64,
    /// i direction step in degrees, always positive, spanning the first and
    /// last points
    pub di: f64,
    /// j direction step in degrees, always positive
    pub dj: f64,
    /// Increments as encoded in the message, when given.
    pub declared_increments: (Option<f64>, Option<f64>),
    pub scanning_mode: ScanningMode,
    /// Angular unit of the encoded values, in degrees.
    pub resolution: f64,
}

impl LatLonGrid {
    /// Builds the grid. Steps are derived from the first and last points; the
    /// declared increments are only checked against them.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        earth: Earth,
        ni: usize,
        nj: usize,
        (la1, lo1): (f64, f64),
        (la2, lo2): (f64, f64),
        (di, dj): (Option<f64>, Option<f64>),
        scanning_mode: ScanningMode,
        resolution: f64,
    ) -> Result<Self, RecordError> {
        if ni == 0 || nj == 0 {
            return Err(RecordError::InconsistentGeometry(format!(
                "empty lat/lon grid {}x{}",
                ni, nj
            )));
        }

        let step_i = if ni > 1 {
            lon_span(lo1, lo2, scanning_mode.i_negative()) / (ni - 1) as f64
        } else {
            di.unwrap_or(0.0)
        };
        let step_j = if nj > 1 {
            (la2 - la1).abs() / (nj - 1) as f64
        } else {
            dj.unwrap_or(0.0)
        };

        Ok(Self {
            earth,
            ni,
            nj,
            la1,
            lo1,
            la2,
            lo2,
            di: step_i,
            dj: step_j,
            declared_increments: (di, dj),
            scanning_mode,
            resolution,
        })
    }

    fn point(&self, i: usize, j: usize) -> Coordinate {
        Coordinate::new(
            self.la1 + self.scanning_mode.j_sign() * j as f64 * self.dj,
            self.lo1 + self.scanning_mode.i_sign() * i as f64 * self.di,
        )
    }
}

impl GridPoints for LatLonGrid {
    fn num_points(&self) -> usize {
        self.ni * self.nj
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        Ok(Box::new(
            ScanOrder::new(self.ni, self.nj, self.scanning_mode).map(move |(i, j)| self.point(i, j)),
        ))
    }

    fn check_increments(&self) -> Result<(), RecordError> {
        let (di, dj) = self.declared_increments;
        if self.ni > 1 {
            check_increment("i", di, self.di, self.ni - 1, self.resolution)?;
        }
        if self.nj > 1 {
            check_increment("j", dj, self.dj, self.nj - 1, self.resolution)?;
        }
        Ok(())
    }

    // Steps span the corners, so only the scanning direction can break closure.
    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        Some((
            self.point(self.ni - 1, self.nj - 1),
            Coordinate::new(self.la2, self.lo2),
            0.0,
        ))
    }
}

/// Latitude/longitude grid on a sphere whose pole has been moved.
/// Points enumerate in the rotated frame; [`RotatedLatLonGrid::unrotate`]
/// maps them back to true latitude/longitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotatedLatLonGrid {
    pub grid: LatLonGrid,
    pub south_pole_lat: f64,
    pub south_pole_lon: f64,
    pub rotation_angle: f64,
}

impl RotatedLatLonGrid {
    pub fn unrotate(&self, c: &Coordinate) -> Coordinate {
        let (lat, lon) = (c.lat.to_radians(), c.lon.to_radians());
        let (xd, yd, zd) = (lon.cos() * lat.cos(), lon.sin() * lat.cos(), lat.sin());

        let t = (-(90.0 + self.south_pole_lat)).to_radians();
        let o = (-self.rotation_angle).to_radians();
        let (sin_t, cos_t) = t.sin_cos();
        let (sin_o, cos_o) = o.sin_cos();

        let x = cos_t * cos_o * xd + sin_o * yd + sin_t * cos_o * zd;
        let y = -cos_t * sin_o * xd + cos_o * yd - sin_t * sin_o * zd;
        let z = (-sin_t * xd + cos_t * zd).clamp(-1.0, 1.0);

        Coordinate::new(
            z.asin().to_degrees(),
            y.atan2(x).to_degrees() - self.rotation_angle + self.south_pole_lon,
        )
    }
}

impl GridPoints for RotatedLatLonGrid {
    fn num_points(&self) -> usize {
        self.grid.num_points()
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        self.grid.points()
    }

    fn check_increments(&self) -> Result<(), RecordError> {
        self.grid.check_increments()
    }

    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        self.grid.closure()
    }
}
