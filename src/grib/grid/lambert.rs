use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use serde::Serialize;

use crate::grib::grid::{Coordinate, Earth, GridPoints, Points, ScanOrder, ScanningMode};
use crate::grib::RecordError;

/// Lambert conformal conic projection, secant or tangent, spherical earth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambertConformalGrid {
    pub earth: Earth,
    pub nx: usize,
    pub ny: usize,
    pub la1: f64,
    pub lo1: f64,
    pub lad: f64,
    pub lov: f64,
    /// Grid lengths in metres.
    pub dx: f64,
    pub dy: f64,
    pub latin1: f64,
    pub latin2: f64,
    pub south_pole_lat: f64,
    pub south_pole_lon: f64,
    pub scanning_mode: ScanningMode,
}

struct Cone {
    n: f64,
    rf: f64,
    lov: f64,
}

impl Cone {
    fn rho(&self, lat: f64) -> f64 {
        self.rf / (FRAC_PI_4 + lat.to_radians() / 2.0).tan().powf(self.n)
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let mut dlon = lon - self.lov;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        let theta = self.n * dlon.to_radians();
        let rho = self.rho(lat);
        (rho * theta.sin(), -rho * theta.cos())
    }

    fn inverse(&self, x: f64, y: f64) -> Coordinate {
        let rho = self.n.signum() * x.hypot(y);
        if rho == 0.0 {
            return Coordinate::new(self.n.signum() * 90.0, self.lov);
        }
        let theta = if self.n > 0.0 {
            x.atan2(-y)
        } else {
            (-x).atan2(y)
        };
        let lat = 2.0 * (self.rf / rho).powf(1.0 / self.n).atan() - FRAC_PI_2;
        Coordinate::new(lat.to_degrees(), self.lov + (theta / self.n).to_degrees())
    }
}

impl LambertConformalGrid {
    fn cone(&self) -> Result<Cone, RecordError> {
        let (phi1, phi2) = (self.latin1.to_radians(), self.latin2.to_radians());
        let t = |phi: f64| (FRAC_PI_4 + phi / 2.0).tan();

        let n = if (self.latin1 - self.latin2).abs() < 1e-9 {
            phi1.sin()
        } else {
            (phi1.cos() / phi2.cos()).ln() / (t(phi2) / t(phi1)).ln()
        };
        if !n.is_finite() || n == 0.0 {
            return Err(RecordError::InconsistentGeometry(format!(
                "standard parallels {} and {} do not define a cone",
                self.latin1, self.latin2
            )));
        }

        let f = phi1.cos() * t(phi1).powf(n) / n;
        Ok(Cone {
            n,
            rf: self.earth.radius * f,
            lov: self.lov,
        })
    }
}

impl GridPoints for LambertConformalGrid {
    fn num_points(&self) -> usize {
        self.nx * self.ny
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        let cone = self.cone()?;
        let (x0, y0) = cone.forward(self.la1, self.lo1);
        let mode = self.scanning_mode;
        let (dx, dy) = (self.dx, self.dy);
        Ok(Box::new(ScanOrder::new(self.nx, self.ny, mode).map(
            move |(i, j)| {
                cone.inverse(
                    x0 + mode.i_sign() * i as f64 * dx,
                    y0 + mode.j_sign() * j as f64 * dy,
                )
            },
        )))
    }

    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        let cone = self.cone().ok()?;
        let (x0, y0) = cone.forward(self.la1, self.lo1);
        Some((
            cone.inverse(x0, y0),
            Coordinate::new(self.la1, self.lo1),
            1e-6,
        ))
    }
}
