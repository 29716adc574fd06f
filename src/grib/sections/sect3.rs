use std::io::Read;

use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::grid::{
    Earth, GaussianGrid, Grid, GridPoints, LambertConformalGrid, LatLonGrid, MercatorGrid,
    PolarStereographicGrid, RotatedLatLonGrid, ScanningMode, SphericalHarmonics,
};
use crate::grib::{RecordError, Result};

const EDITION: u8 = 2;
/// Default angular unit of edition 2 templates, in degrees.
const MICRO_DEGREE: f64 = 1e-6;
/// Edition 2 grid lengths are in millimetres.
const MILLIMETRE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridDefinition {
    /// Number of data points
    pub num_points: usize,
    /// Grid Definition Template Number (edition 1: data representation type)
    pub template_number: u16,
    pub grid: Grid,
}

impl GridDefinition {
    /// Decodes a section 3 body, octet 6 onwards. `body_len` bounds the
    /// optional list of numbers at the end of the section.
    pub(crate) fn decode<R: Read>(cursor: &mut BitCursor<R>, body_len: usize) -> Result<Self> {
        let source = cursor.read_u8()?;
        let num_points = cursor.read_u32()? as usize;
        let list_octets = cursor.read_u8()? as usize;
        let list_interpretation = cursor.read_u8()?;
        let template_number = cursor.read_u16()?;

        if source != 0 {
            return Err(RecordError::UnsupportedTemplate {
                section: 3,
                template: template_number,
                reason: format!("grid definition source {} is not a template", source),
            }
            .into());
        }

        let grid = match template_number {
            0 | 1 | 40 => {
                let earth = read_earth(cursor)?;
                let ni = cursor.read_u32_opt()?;
                let nj = cursor.read_u32()? as usize;
                let unit = read_angle_unit(cursor)?;
                let la1 = cursor.read_i32()? as f64 * unit;
                let lo1 = cursor.read_i32()? as f64 * unit;
                let flags = cursor.read_u8()?;
                let la2 = cursor.read_i32()? as f64 * unit;
                let lo2 = cursor.read_i32()? as f64 * unit;
                let di = cursor.read_u32_opt()?.filter(|_| flags & 0x20 != 0);
                let dj_or_n = cursor.read_u32_opt()?;
                let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;

                match template_number {
                    40 => {
                        let n = dj_or_n.ok_or_else(|| {
                            RecordError::InconsistentGeometry(String::from(
                                "Gaussian grid without number of parallels",
                            ))
                        })? as usize;
                        let pl = if ni.is_none() {
                            Some(read_list(cursor, list_octets, list_interpretation, nj, body_len)?)
                        } else {
                            None
                        };
                        Grid::Gaussian(GaussianGrid::new(
                            earth,
                            ni.map(|ni| ni as usize),
                            nj,
                            (la1, lo1),
                            (la2, lo2),
                            di.map(|di| di as f64 * unit),
                            n,
                            scanning_mode,
                            unit,
                            pl,
                        )?)
                    }
                    _ => {
                        let ni = ni.ok_or_else(|| {
                            RecordError::UnsupportedTemplate {
                                section: 3,
                                template: template_number,
                                reason: String::from("quasi-regular lat/lon grids are not supported"),
                            }
                        })? as usize;
                        let dj = dj_or_n.filter(|_| flags & 0x10 != 0);
                        let grid = LatLonGrid::new(
                            earth,
                            ni,
                            nj,
                            (la1, lo1),
                            (la2, lo2),
                            (di.map(|d| d as f64 * unit), dj.map(|d| d as f64 * unit)),
                            scanning_mode,
                            unit,
                        )?;
                        if template_number == 1 {
                            let south_pole_lat = cursor.read_i32()? as f64 * unit;
                            let south_pole_lon = cursor.read_i32()? as f64 * unit;
                            let rotation_angle = cursor.read_ieee_f32()? as f64;
                            Grid::RotatedLatLon(RotatedLatLonGrid {
                                grid,
                                south_pole_lat,
                                south_pole_lon,
                                rotation_angle,
                            })
                        } else {
                            Grid::LatLon(grid)
                        }
                    }
                }
            }
            10 => {
                let earth = read_earth(cursor)?;
                let ni = cursor.read_u32()? as usize;
                let nj = cursor.read_u32()? as usize;
                let la1 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let lo1 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let _flags = cursor.read_u8()?;
                let lad = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let la2 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let lo2 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;
                let orientation = cursor.read_u32()?;
                if orientation != 0 {
                    return Err(RecordError::UnsupportedTemplate {
                        section: 3,
                        template: template_number,
                        reason: format!("Mercator grid tilted by {} micro-degrees", orientation),
                    }
                    .into());
                }
                Grid::Mercator(MercatorGrid {
                    earth,
                    ni,
                    nj,
                    la1,
                    lo1,
                    la2,
                    lo2,
                    lad,
                    di: cursor.read_u32()? as f64 * MILLIMETRE,
                    dj: cursor.read_u32()? as f64 * MILLIMETRE,
                    scanning_mode,
                    resolution: MICRO_DEGREE,
                    length_unit: MILLIMETRE,
                })
            }
            20 | 30 => {
                let earth = read_earth(cursor)?;
                let nx = cursor.read_u32()? as usize;
                let ny = cursor.read_u32()? as usize;
                let la1 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let lo1 = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let _flags = cursor.read_u8()?;
                let lad = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let lov = cursor.read_i32()? as f64 * MICRO_DEGREE;
                let dx = cursor.read_u32()? as f64 * MILLIMETRE;
                let dy = cursor.read_u32()? as f64 * MILLIMETRE;
                let south_pole = cursor.read_u8()? & 0x80 != 0;
                let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;

                if template_number == 20 {
                    Grid::PolarStereographic(PolarStereographicGrid {
                        earth,
                        nx,
                        ny,
                        la1,
                        lo1,
                        lad,
                        lov,
                        dx,
                        dy,
                        south_pole,
                        scanning_mode,
                    })
                } else {
                    Grid::LambertConformal(LambertConformalGrid {
                        earth,
                        nx,
                        ny,
                        la1,
                        lo1,
                        lad,
                        lov,
                        dx,
                        dy,
                        latin1: cursor.read_i32()? as f64 * MICRO_DEGREE,
                        latin2: cursor.read_i32()? as f64 * MICRO_DEGREE,
                        south_pole_lat: cursor.read_i32()? as f64 * MICRO_DEGREE,
                        south_pole_lon: cursor.read_i32()? as f64 * MICRO_DEGREE,
                        scanning_mode,
                    })
                }
            }
            50 => Grid::SphericalHarmonics(SphericalHarmonics {
                j: cursor.read_u32()?,
                k: cursor.read_u32()?,
                m: cursor.read_u32()?,
                representation_type: cursor.read_u8()?,
                representation_mode: cursor.read_u8()?,
            }),
            n => {
                return Err(RecordError::UnsupportedTemplate {
                    section: 3,
                    template: n,
                    reason: String::from("no decoder for this grid definition template"),
                }
                .into())
            }
        };

        if !matches!(grid, Grid::SphericalHarmonics(_)) && grid.num_points() != num_points {
            return Err(RecordError::InconsistentGeometry(format!(
                "grid {} has {} points but section 3 declares {}",
                grid.name(),
                grid.num_points(),
                num_points
            ))
            .into());
        }

        debug!("Grid definition template 3.{} : {}", template_number, grid.name());

        Ok(Self {
            num_points,
            template_number,
            grid,
        })
    }
}

fn read_earth<R: Read>(cursor: &mut BitCursor<R>) -> Result<Earth> {
    let shape = cursor.read_u8()?;
    let radius = read_scaled(cursor)?;
    let major_axis = read_scaled(cursor)?;
    let _minor_axis = read_scaled(cursor)?;
    Ok(Earth::from_shape(shape, radius, major_axis)?)
}

fn read_scaled<R: Read>(cursor: &mut BitCursor<R>) -> Result<Option<f64>> {
    let scale = cursor.read_u8()?;
    let value = cursor.read_u32_opt()?;
    Ok(match (scale, value) {
        (u8::MAX, _) | (_, None) => None,
        (scale, Some(value)) => Some(value as f64 / 10_f64.powi(scale as i32)),
    })
}

/// Basic angle of the initial production domain and its subdivisions.
fn read_angle_unit<R: Read>(cursor: &mut BitCursor<R>) -> Result<f64> {
    let basic_angle = cursor.read_u32_opt()?;
    let subdivisions = cursor.read_u32_opt()?;
    Ok(match (basic_angle, subdivisions) {
        (Some(angle), Some(sub)) if angle != 0 && sub != 0 => angle as f64 / sub as f64,
        _ => MICRO_DEGREE,
    })
}

fn read_list<R: Read>(
    cursor: &mut BitCursor<R>,
    octets: usize,
    interpretation: u8,
    rows: usize,
    body_len: usize,
) -> Result<Vec<usize>> {
    if octets == 0 || interpretation == 0 {
        return Err(RecordError::InconsistentGeometry(format!(
            "reduced grid without a list of points per row ({} octets, interpretation {})",
            octets, interpretation
        ))
        .into());
    }
    let available = body_len.saturating_sub(cursor.position() as usize) / octets;
    if available < rows {
        return Err(RecordError::InconsistentGeometry(format!(
            "list of points holds {} rows, {} needed",
            available, rows
        ))
        .into());
    }
    (0..rows)
        .map(|_| {
            let mut buf = [0; 8];
            cursor.read_exact(&mut buf[8 - octets.min(8)..])?;
            Ok(u64::from_be_bytes(buf) as usize)
        })
        .collect()
}
