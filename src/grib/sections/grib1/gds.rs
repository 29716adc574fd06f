use std::io::{Read, Seek};

use crate::grib::cursor::BitCursor;
use crate::grib::grid::{
    Earth, GaussianGrid, Grid, GridPoints, LambertConformalGrid, LatLonGrid, MercatorGrid,
    PolarStereographicGrid, RotatedLatLonGrid, ScanningMode, SphericalHarmonics,
};
use crate::grib::sections::sect3::GridDefinition;
use crate::grib::{RecordError, Result};

const EDITION: u8 = 1;
/// Edition 1 angles are in millidegrees.
const MILLI_DEGREE: f64 = 1e-3;
/// Octet of the section the body starts at.
const BODY_START: u64 = 4;

/// Decodes a grid description section from octet 4 onwards.
pub(crate) fn decode<R: Read + Seek>(
    cursor: &mut BitCursor<R>,
    body_len: usize,
) -> Result<GridDefinition> {
    let nv = cursor.read_u8()? as u64;
    let pv_pl = cursor.read_u8()?;
    let data_type = cursor.read_u8()?;
    let template_number = data_type as u16;
    let earth = Earth::GRIB1;

    let grid = match data_type {
        0 | 4 | 10 => {
            let ni = read_u16_opt(cursor)?;
            let nj = cursor.read_u16()? as usize;
            let la1 = read_angle(cursor)?;
            let lo1 = read_angle(cursor)?;
            let flags = cursor.read_u8()?;
            let la2 = read_angle(cursor)?;
            let lo2 = read_angle(cursor)?;
            let di = read_u16_opt(cursor)?.filter(|_| flags & 0x80 != 0);
            let dj_or_n = read_u16_opt(cursor)?;
            let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;
            let di = di.map(|d| d as f64 * MILLI_DEGREE);

            if data_type == 4 {
                let n = dj_or_n.ok_or_else(|| {
                    RecordError::InconsistentGeometry(String::from(
                        "Gaussian grid without number of parallels",
                    ))
                })? as usize;
                let pl = match ni {
                    Some(_) => None,
                    None => Some(read_pl(cursor, nv, pv_pl, nj, body_len)?),
                };
                Grid::Gaussian(GaussianGrid::new(
                    earth,
                    ni.map(|ni| ni as usize),
                    nj,
                    (la1, lo1),
                    (la2, lo2),
                    di,
                    n,
                    scanning_mode,
                    MILLI_DEGREE,
                    pl,
                )?)
            } else {
                let ni = ni.ok_or_else(|| RecordError::UnsupportedTemplate {
                    section: 2,
                    template: template_number,
                    reason: String::from("quasi-regular lat/lon grids are not supported"),
                })? as usize;
                let dj = dj_or_n
                    .filter(|_| flags & 0x80 != 0)
                    .map(|d| d as f64 * MILLI_DEGREE);
                let grid = LatLonGrid::new(
                    earth,
                    ni,
                    nj,
                    (la1, lo1),
                    (la2, lo2),
                    (di, dj),
                    scanning_mode,
                    MILLI_DEGREE,
                )?;
                if data_type == 10 {
                    // octets 29 to 32 are reserved
                    cursor.skip(4)?;
                    Grid::RotatedLatLon(RotatedLatLonGrid {
                        grid,
                        south_pole_lat: read_angle(cursor)?,
                        south_pole_lon: read_angle(cursor)?,
                        rotation_angle: cursor.read_ibm_f32()?,
                    })
                } else {
                    Grid::LatLon(grid)
                }
            }
        }
        1 => {
            let ni = cursor.read_u16()? as usize;
            let nj = cursor.read_u16()? as usize;
            let la1 = read_angle(cursor)?;
            let lo1 = read_angle(cursor)?;
            let _flags = cursor.read_u8()?;
            let la2 = read_angle(cursor)?;
            let lo2 = read_angle(cursor)?;
            let lad = read_angle(cursor)?;
            cursor.skip(1)?;
            let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;
            Grid::Mercator(MercatorGrid {
                earth,
                ni,
                nj,
                la1,
                lo1,
                la2,
                lo2,
                lad,
                di: cursor.read_u24()? as f64,
                dj: cursor.read_u24()? as f64,
                scanning_mode,
                resolution: MILLI_DEGREE,
                length_unit: 1.0,
            })
        }
        3 | 5 => {
            let nx = cursor.read_u16()? as usize;
            let ny = cursor.read_u16()? as usize;
            let la1 = read_angle(cursor)?;
            let lo1 = read_angle(cursor)?;
            let _flags = cursor.read_u8()?;
            let lov = read_angle(cursor)?;
            let dx = cursor.read_u24()? as f64;
            let dy = cursor.read_u24()? as f64;
            let south_pole = cursor.read_u8()? & 0x80 != 0;
            let scanning_mode = ScanningMode::new(cursor.read_u8()?, EDITION)?;

            if data_type == 5 {
                Grid::PolarStereographic(PolarStereographicGrid {
                    earth,
                    nx,
                    ny,
                    la1,
                    lo1,
                    // true at 60 degrees
                    lad: if south_pole { -60.0 } else { 60.0 },
                    lov,
                    dx,
                    dy,
                    south_pole,
                    scanning_mode,
                })
            } else {
                let latin1 = read_angle(cursor)?;
                Grid::LambertConformal(LambertConformalGrid {
                    earth,
                    nx,
                    ny,
                    la1,
                    lo1,
                    lad: latin1,
                    lov,
                    dx,
                    dy,
                    latin1,
                    latin2: read_angle(cursor)?,
                    south_pole_lat: read_angle(cursor)?,
                    south_pole_lon: read_angle(cursor)?,
                    scanning_mode,
                })
            }
        }
        50 => Grid::SphericalHarmonics(SphericalHarmonics {
            j: cursor.read_u16()? as u32,
            k: cursor.read_u16()? as u32,
            m: cursor.read_u16()? as u32,
            representation_type: cursor.read_u8()?,
            representation_mode: cursor.read_u8()?,
        }),
        n => {
            return Err(RecordError::UnsupportedTemplate {
                section: 2,
                template: n as u16,
                reason: String::from("no decoder for this data representation type"),
            }
            .into())
        }
    };

    debug!("Grid description type {} : {}", data_type, grid.name());

    Ok(GridDefinition {
        num_points: grid.num_points(),
        template_number,
        grid,
    })
}

fn read_angle<R: Read>(cursor: &mut BitCursor<R>) -> Result<f64> {
    Ok(cursor.read_i24()? as f64 * MILLI_DEGREE)
}

fn read_u16_opt<R: Read>(cursor: &mut BitCursor<R>) -> Result<Option<u16>> {
    let raw = cursor.read_u16()?;
    Ok(if raw == u16::MAX { None } else { Some(raw) })
}

/// Points per row of a quasi-regular grid, two octets each, after the
/// vertical coordinate parameters.
fn read_pl<R: Read + Seek>(
    cursor: &mut BitCursor<R>,
    nv: u64,
    pv_pl: u8,
    rows: usize,
    body_len: usize,
) -> Result<Vec<usize>> {
    if pv_pl == u8::MAX || (pv_pl as u64) < BODY_START {
        return Err(RecordError::InconsistentGeometry(format!(
            "reduced grid without a list of points per row (location {})",
            pv_pl
        ))
        .into());
    }
    let start = pv_pl as u64 - BODY_START + 4 * nv;
    let available = (body_len as u64).saturating_sub(start) / 2;
    if available < rows as u64 {
        return Err(RecordError::InconsistentGeometry(format!(
            "list of points holds {} rows, {} needed",
            available, rows
        ))
        .into());
    }
    cursor.seek(start)?;
    (0..rows)
        .map(|_| Ok(cursor.read_u16()? as usize))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::io::Cursor;

    fn i24(value: i32) -> [u8; 3] {
        let magnitude = value.unsigned_abs();
        let sign = if value < 0 { 0x80 } else { 0 };
        [sign | (magnitude >> 16) as u8, (magnitude >> 8) as u8, magnitude as u8]
    }

    pub(crate) fn latlon_body() -> Vec<u8> {
        let mut body = vec![0, 255, 0];
        body.extend(4u16.to_be_bytes());
        body.extend(3u16.to_be_bytes());
        body.extend(i24(60_000));
        body.extend(i24(-10_000));
        body.push(0x80);
        body.extend(i24(58_000));
        body.extend(i24(-7_000));
        body.extend(1000u16.to_be_bytes());
        body.extend(1000u16.to_be_bytes());
        body.push(0);
        body.extend([0; 4]);
        body
    }

    fn decode_body(body: Vec<u8>) -> Result<GridDefinition> {
        let len = body.len();
        decode(&mut BitCursor::new(Cursor::new(body)), len)
    }

    #[test]
    fn decodes_latlon() {
        let def = decode_body(latlon_body()).unwrap();
        assert_eq!(def.num_points, 12);
        match def.grid {
            Grid::LatLon(grid) => {
                assert_approx_eq!(f64, grid.lo1, -10.0);
                assert_approx_eq!(f64, grid.dj, 1.0);
                assert_eq!(grid.earth, Earth::GRIB1);
            }
            other => panic!("unexpected grid {:?}", other),
        }
    }

    #[test]
    fn decodes_reduced_gaussian() {
        let mut body = vec![0, 33, 4];
        body.extend(u16::MAX.to_be_bytes());
        body.extend(2u16.to_be_bytes());
        body.extend(i24(35_264));
        body.extend(i24(0));
        body.push(0);
        body.extend(i24(-35_264));
        body.extend(i24(270_000));
        body.extend(u16::MAX.to_be_bytes());
        body.extend(1u16.to_be_bytes());
        body.push(0);
        body.extend([0; 4]);
        body.extend(4u16.to_be_bytes());
        body.extend(4u16.to_be_bytes());
        let def = decode_body(body).unwrap();
        assert_eq!(def.grid.name(), "reduced_gg");
        assert_eq!(def.num_points, 8);
    }

    #[test]
    fn unknown_type_is_a_record_error() {
        assert!(matches!(
            decode_body(vec![0, 255, 192]),
            Err(crate::grib::GribError::Record(RecordError::UnsupportedTemplate {
                template: 192,
                ..
            }))
        ));
    }
}
