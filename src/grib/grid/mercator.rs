use std::f64::consts::FRAC_PI_4;

use serde::Serialize;

use crate::grib::grid::{Coordinate, Earth, GridPoints, Points, ScanOrder, ScanningMode};
use crate::grib::RecordError;

/// Mercator projection, spherical earth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MercatorGrid {
    pub earth: Earth,
    pub ni: usize,
    pub nj: usize,
    pub la1: f64,
    pub lo1: f64,
    pub la2: f64,
    pub lo2: f64,
    /// Latitude where the cylinder intersects the earth, in degrees.
    pub lad: f64,
    /// Grid lengths in metres.
    pub di: f64,
    pub dj: f64,
    pub scanning_mode: ScanningMode,
    pub resolution: f64,
    /// Unit of the encoded grid lengths, in metres.
    pub length_unit: f64,
}

impl MercatorGrid {
    fn scale(&self) -> f64 {
        self.earth.radius * self.lad.to_radians().cos()
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat = lat.to_radians();
        (
            self.scale() * lon.to_radians(),
            self.scale() * (FRAC_PI_4 + lat / 2.0).tan().ln(),
        )
    }

    fn inverse(&self, x: f64, y: f64) -> Coordinate {
        Coordinate::new(
            (2.0 * (y / self.scale()).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
            (x / self.scale()).to_degrees(),
        )
    }

    fn point(&self, origin: (f64, f64), i: usize, j: usize) -> Coordinate {
        self.inverse(
            origin.0 + self.scanning_mode.i_sign() * i as f64 * self.di,
            origin.1 + self.scanning_mode.j_sign() * j as f64 * self.dj,
        )
    }
}

impl GridPoints for MercatorGrid {
    fn num_points(&self) -> usize {
        self.ni * self.nj
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        if self.scale() <= 0.0 {
            return Err(RecordError::InconsistentGeometry(format!(
                "Mercator latitude {} leaves no scale",
                self.lad
            )));
        }
        let origin = self.forward(self.la1, self.lo1);
        Ok(Box::new(
            ScanOrder::new(self.ni, self.nj, self.scanning_mode)
                .map(move |(i, j)| self.point(origin, i, j)),
        ))
    }

    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        if self.ni == 0 || self.nj == 0 {
            return None;
        }
        let origin = self.forward(self.la1, self.lo1);
        let steps = (self.ni.max(self.nj) - 1).max(1) as f64;
        let drift = (steps * self.length_unit / self.scale()).to_degrees();
        Some((
            self.point(origin, self.ni - 1, self.nj - 1),
            Coordinate::new(self.la2, self.lo2),
            2.0 * self.resolution + drift,
        ))
    }
}
