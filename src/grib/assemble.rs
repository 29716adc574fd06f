use crate::grib::grid::{Coordinate, Grid, GridPoints, Points};
use crate::grib::RecordError;

/// Grid point coordinates paired with their decoded values, in data order.
pub struct GridValues<'a> {
    points: Points<'a>,
    values: std::vec::IntoIter<Option<f64>>,
}

impl<'a> GridValues<'a> {
    /// Pairs `values` with the points of `grid`. With a `tolerance` the grid
    /// closure is checked first.
    pub fn new(
        grid: &'a Grid,
        values: Vec<Option<f64>>,
        tolerance: Option<f64>,
    ) -> Result<Self, RecordError> {
        Self::with_points(grid, values, tolerance, Grid::points)
    }

    /// As [`GridValues::new`], with the points of rotated grids given in true
    /// latitude and longitude.
    pub fn geographic(
        grid: &'a Grid,
        values: Vec<Option<f64>>,
        tolerance: Option<f64>,
    ) -> Result<Self, RecordError> {
        Self::with_points(grid, values, tolerance, Grid::geographic_points)
    }

    fn with_points(
        grid: &'a Grid,
        values: Vec<Option<f64>>,
        tolerance: Option<f64>,
        points: fn(&'a Grid) -> Result<Points<'a>, RecordError>,
    ) -> Result<Self, RecordError> {
        if values.len() != grid.num_points() {
            return Err(RecordError::MalformedPacking(format!(
                "{} values decoded for a grid of {} points",
                values.len(),
                grid.num_points()
            )));
        }

        if let Some(tolerance) = tolerance {
            grid.check(tolerance)?;
        }

        Ok(Self {
            points: points(grid)?,
            values: values.into_iter(),
        })
    }
}

impl<'a> Iterator for GridValues<'a> {
    type Item = (Coordinate, Option<f64>);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.points.next()?, self.values.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<'a> ExactSizeIterator for GridValues<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grib::grid::{Earth, LatLonGrid, RotatedLatLonGrid, ScanningMode};
    use float_cmp::assert_approx_eq;

    fn grid(la2: f64) -> Grid {
        Grid::LatLon(latlon(la2))
    }

    fn latlon(la2: f64) -> LatLonGrid {
        LatLonGrid::new(
            Earth::GRIB1,
            3,
            2,
            (10.0, 0.0),
            (la2, 2.0),
            (Some(1.0), Some(1.0)),
            ScanningMode::new(0, 2).unwrap(),
            1e-6,
        )
        .unwrap()
    }

    #[test]
    fn pairs_points_with_values() {
        let grid = grid(9.0);
        let values: Vec<_> = (0..6).map(|v| Some(v as f64)).collect();
        let pairs: Vec<_> = GridValues::new(&grid, values, Some(1e-6)).unwrap().collect();
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], (Coordinate::new(10.0, 0.0), Some(0.0)));
        assert_eq!(pairs[5], (Coordinate::new(9.0, 2.0), Some(5.0)));
    }

    #[test]
    fn value_count_must_match() {
        let grid = grid(9.0);
        assert!(matches!(
            GridValues::new(&grid, vec![None; 5], None),
            Err(RecordError::MalformedPacking(_))
        ));
    }

    #[test]
    fn closure_is_checked_on_request() {
        let grid = grid(8.0);
        assert!(matches!(
            GridValues::new(&grid, vec![None; 6], Some(1e-6)),
            Err(RecordError::InconsistentGeometry(_))
        ));
        assert_eq!(GridValues::new(&grid, vec![None; 6], None).unwrap().len(), 6);
    }

    #[test]
    fn rotated_grid_in_true_coordinates() {
        // south pole at 30S 10E moves the rotated origin to 60N 10E
        let grid = Grid::RotatedLatLon(RotatedLatLonGrid {
            grid: latlon(9.0),
            south_pole_lat: -30.0,
            south_pole_lon: 10.0,
            rotation_angle: 0.0,
        });
        let values: Vec<_> = (0..6).map(|v| Some(v as f64)).collect();

        let rotated: Vec<_> = GridValues::new(&grid, values.clone(), Some(1e-6))
            .unwrap()
            .collect();
        assert_eq!(rotated[0].0, Coordinate::new(10.0, 0.0));

        let geographic: Vec<_> = GridValues::geographic(&grid, values, Some(1e-6))
            .unwrap()
            .collect();
        assert_eq!(geographic.len(), 6);
        let (first, value) = geographic[0];
        assert_approx_eq!(f64, first.lat, 70.0, epsilon = 1e-9);
        assert_approx_eq!(f64, first.lon, 10.0, epsilon = 1e-9);
        assert_eq!(value, Some(0.0));
    }

    #[test]
    fn geographic_leaves_other_grids_alone() {
        let grid = grid(9.0);
        let pairs: Vec<_> = GridValues::geographic(&grid, vec![None; 6], None)
            .unwrap()
            .collect();
        assert_eq!(pairs[5].0, Coordinate::new(9.0, 2.0));
    }
}
