use std::f64::consts::PI;

use serde::Serialize;

use crate::grib::grid::{
    check_increment, lon_span, Coordinate, Earth, GridPoints, Points, ScanOrder, ScanningMode,
};
use crate::grib::RecordError;

/// Latitudes of the Gaussian grid with `n` parallels between a pole and the
/// equator, north to south, in degrees: the roots of the Legendre polynomial
/// of degree `2n`.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    let nlat = 2 * n;
    let mut lats = vec![0.0; nlat];

    for i in 0..n {
        let mut z = (PI * (i as f64 + 0.75) / (nlat as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (mut p1, mut p2) = (1.0, 0.0);
            for j in 1..=nlat {
                let p3 = p2;
                p2 = p1;
                p1 = ((2 * j - 1) as f64 * z * p2 - (j - 1) as f64 * p3) / j as f64;
            }
            let pp = nlat as f64 * (z * p1 - p2) / (z * z - 1.0);
            let z1 = z;
            z = z1 - p1 / pp;
            if (z - z1).abs() < 1e-15 {
                break;
            }
        }
        lats[i] = z.asin().to_degrees();
        lats[nlat - 1 - i] = -lats[i];
    }

    lats
}

/// Gaussian latitude/longitude grid, regular or reduced (one point count per
/// row in `pl`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaussianGrid {
    pub earth: Earth,
    /// Points per row; `None` for reduced grids.
    pub ni: Option<usize>,
    pub nj: usize,
    pub la1: f64,
    pub lo1: f64,
    pub la2: f64,
    pub lo2: f64,
    /// i direction increment as encoded; rows are stepped from `lo1` to `lo2`.
    pub di: Option<f64>,
    /// Number of parallels between a pole and the equator.
    pub n: usize,
    pub scanning_mode: ScanningMode,
    pub resolution: f64,
    pub pl: Option<Vec<usize>>,
    #[serde(skip)]
    latitudes: Vec<f64>,
    #[serde(skip)]
    first_row: usize,
}

impl GaussianGrid {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        earth: Earth,
        ni: Option<usize>,
        nj: usize,
        (la1, lo1): (f64, f64),
        (la2, lo2): (f64, f64),
        di: Option<f64>,
        n: usize,
        scanning_mode: ScanningMode,
        resolution: f64,
        pl: Option<Vec<usize>>,
    ) -> Result<Self, RecordError> {
        if n == 0 || nj == 0 || nj > 2 * n {
            return Err(RecordError::InconsistentGeometry(format!(
                "{} rows do not fit a Gaussian grid of N={}",
                nj, n
            )));
        }
        match (&ni, &pl) {
            (None, None) => {
                return Err(RecordError::InconsistentGeometry(String::from(
                    "Gaussian grid without row length nor reduced point list",
                )))
            }
            (None, Some(pl)) if pl.len() != nj => {
                return Err(RecordError::InconsistentGeometry(format!(
                    "reduced Gaussian grid declares {} rows but lists {}",
                    nj,
                    pl.len()
                )))
            }
            _ => {}
        }
        if pl.is_some() && scanning_mode.j_consecutive() {
            return Err(RecordError::UnsupportedTemplate {
                section: 3,
                template: scanning_mode.0 as u16,
                reason: String::from("reduced grids must be consecutive in i"),
            });
        }

        let latitudes = gaussian_latitudes(n);
        let (first_row, distance) = latitudes
            .iter()
            .enumerate()
            .map(|(k, lat)| (k, (lat - la1).abs()))
            .fold((0, f64::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });

        if distance > resolution.max(1e-6) {
            return Err(RecordError::InconsistentGeometry(format!(
                "first latitude {} is not a Gaussian latitude of N={}",
                la1, n
            )));
        }

        let rows_left = if scanning_mode.j_positive() {
            first_row + 1
        } else {
            2 * n - first_row
        };
        if nj > rows_left {
            return Err(RecordError::InconsistentGeometry(format!(
                "{} rows run past the pole from latitude {}",
                nj, la1
            )));
        }

        Ok(Self {
            earth,
            ni,
            nj,
            la1,
            lo1,
            la2,
            lo2,
            di,
            n,
            scanning_mode,
            resolution,
            pl,
            latitudes,
            first_row,
        })
    }

    fn row_lat(&self, j: usize) -> f64 {
        let k = if self.scanning_mode.j_positive() {
            self.first_row - j
        } else {
            self.first_row + j
        };
        self.latitudes[k]
    }

    /// Longest row; reduced global grids declare their last longitude from it.
    fn max_row(&self) -> usize {
        match (&self.pl, self.ni) {
            (Some(pl), _) => pl.iter().copied().max().unwrap_or(0),
            (None, Some(ni)) => ni,
            (None, None) => 0,
        }
    }

    fn is_global(&self) -> bool {
        let max = self.max_row();
        if max == 0 {
            return false;
        }
        let step = 360.0 / max as f64;
        let span = lon_span(self.lo1, self.lo2, self.scanning_mode.i_negative());
        (span + step - 360.0).abs() < step / 2.0
    }

    fn row_step(&self, points: usize) -> f64 {
        if points <= 1 {
            0.0
        } else if self.is_global() {
            360.0 / points as f64
        } else {
            lon_span(self.lo1, self.lo2, self.scanning_mode.i_negative()) / (points - 1) as f64
        }
    }

    fn point(&self, i: usize, j: usize, step: f64) -> Coordinate {
        Coordinate::new(
            self.row_lat(j),
            self.lo1 + self.scanning_mode.i_sign() * i as f64 * step,
        )
    }
}

impl GridPoints for GaussianGrid {
    fn num_points(&self) -> usize {
        match (&self.pl, self.ni) {
            (Some(pl), _) => pl.iter().sum(),
            (None, Some(ni)) => ni * self.nj,
            (None, None) => 0,
        }
    }

    fn points(&self) -> Result<Points<'_>, RecordError> {
        match (&self.pl, self.ni) {
            (Some(pl), _) => Ok(Box::new(pl.iter().enumerate().flat_map(move |(j, &count)| {
                let step = self.row_step(count);
                let alternate = self.scanning_mode.alternate_rows() && j % 2 == 1;
                (0..count).map(move |i| {
                    let i = if alternate { count - 1 - i } else { i };
                    self.point(i, j, step)
                })
            }))),
            (None, Some(ni)) => {
                let step = self.row_step(ni);
                Ok(Box::new(
                    ScanOrder::new(ni, self.nj, self.scanning_mode)
                        .map(move |(i, j)| self.point(i, j, step)),
                ))
            }
            (None, None) => Ok(Box::new(std::iter::empty())),
        }
    }

    fn check_increments(&self) -> Result<(), RecordError> {
        match (self.ni, &self.pl) {
            (Some(ni), None) if ni > 1 => {
                check_increment("i", self.di, self.row_step(ni), ni - 1, self.resolution)
            }
            _ => Ok(()),
        }
    }

    // Longitudes close by construction; the last latitude is only rounded.
    fn closure(&self) -> Option<(Coordinate, Coordinate, f64)> {
        let last_row = self.nj - 1;
        let count = self.max_row();
        if count == 0 {
            return None;
        }
        let step = self.row_step(count);
        let computed = self.point(count - 1, last_row, step);
        Some((
            computed,
            Coordinate::new(self.la2, self.lo2),
            self.resolution,
        ))
    }
}
