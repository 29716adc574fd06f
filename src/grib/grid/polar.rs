use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::grib::grid::{Coordinate, Earth, GridPoints, Points, ScanOrder, ScanningMode};
use crate::grib::RecordError;

/// Polar stereographic projection, spherical earth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarStereographicGrid {
    pub earth: Earth,
    pub nx: usize,
    pub ny: usize,
    pub la1: f64,
    pub lo1: f64,
    /// Latitude where `dx`/`dy` are true, in degrees.
    pub lad: f64,
    /// Orientation: longitude parallel to the y axis, in degrees.
    pub lov: f64,
    /// Grid lengths in metres.
    pub dx: f64,
    pub dy: f64,
    /// Projection plane tangent at the south pole.
    pub south_pole: bool,
    pub scanning_mode: ScanningMode,
}

impl PolarStereographicGrid {
    fn hemisphere(&self) -> f64 {
        if self.south_pole {
            -1.0
        } else {
            1.0
        }
    }

    /// Radius of the projection at the equator for a unit `tan` term.
    fn scale(&self) -> f64 {
        self.earth.radius * (1.0 + (self.hemisphere() * self.lad).to_radians().sin())
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let h = self.hemisphere();
        let phi = (h * lat).to_radians();
        let rho = self.scale() * (FRAC_PI_2 / 2.0 - phi / 2.0).tan();
        let dlon = (lon - self.lov).to_radians();
        (rho * dlon.sin(), -h * rho * dlon.cos())
    }

    fn inverse(&self, x: f64, y: f64) -> Coordinate {
        let h = self.hemisphere();
        let rho = x.hypot(y);
        let lat = FRAC_PI_2 - 2.0 * (rho / self.scale()).atan();
        let lon = if rho == 0.0 {
            0.0
        } else {
            x.atan2(-h * y).to_degrees()
        };
        Coordinate::new(h * lat.to_degrees(), self.lov + lon)
    }
}

impl GridPoints for PolarStereographicGrid {
    fn num_points(&self) -> usize {
        self.nx * self.ny
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        let (x0, y0) = self.forward(self.la1, self.lo1);
        Ok(Box::new(
            ScanOrder::new(self.nx, self.ny, self.scanning_mode).map(move |(i, j)| {
                self.inverse(
                    x0 + self.scanning_mode.i_sign() * i as f64 * self.dx,
                    y0 + self.scanning_mode.j_sign() * j as f64 * self.dy,
                )
            }),
        ))
    }

    // No last point is declared; the first one must survive the projection.
    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        let (x0, y0) = self.forward(self.la1, self.lo1);
        Some((
            self.inverse(x0, y0),
            Coordinate::new(self.la1, self.lo1),
            1e-6,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn grid(south_pole: bool) -> PolarStereographicGrid {
        PolarStereographicGrid {
            earth: Earth::from_shape(6, None, None).unwrap(),
            nx: 5,
            ny: 5,
            la1: if south_pole { -40.000001 } else { 40.000001 },
            lo1: 349.999999,
            lad: if south_pole { -60.0 } else { 60.0 },
            lov: 0.0,
            dx: 100_000.0,
            dy: 100_000.0,
            south_pole,
            scanning_mode: ScanningMode(0x40),
        }
    }

    #[test]
    fn starts_at_the_declared_point() {
        let g = grid(false);
        let points: Vec<_> = g.enumerate().unwrap().collect();
        assert_eq!(points.len(), 25);
        assert_approx_eq!(f64, points[0].lat, 40.000001, epsilon = 1e-9);
        assert_approx_eq!(f64, points[0].lon, 349.999999, epsilon = 1e-9);
    }

    #[test]
    fn positive_y_heads_north_in_both_hemispheres() {
        for south in [false, true] {
            let g = grid(south);
            let points: Vec<_> = g.enumerate().unwrap().collect();
            assert_approx_eq!(f64, points[0].lat, g.la1, epsilon = 1e-9);
            assert!(points[20].lat > points[0].lat);
        }
    }

    #[test]
    fn south_pole_mirrors_north_pole() {
        let (north, south) = (grid(false), grid(true));
        let n: Vec<_> = north.points().unwrap().collect();
        let s: Vec<_> = south.points().unwrap().collect();
        for i in 0..5 {
            assert_approx_eq!(f64, n[i].lat, -s[i].lat, epsilon = 1e-9);
            assert_approx_eq!(f64, n[i].lon, s[i].lon, epsilon = 1e-9);
        }
    }

    #[test]
    fn pole_maps_to_origin() {
        let g = grid(false);
        let c = g.inverse(0.0, 0.0);
        assert_eq!(c.lat, 90.0);
    }
}
