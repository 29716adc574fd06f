use std::io::Read;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::sections::sect1::{ref_time, Identification};
use crate::grib::sections::sect4::forecast_duration;
use crate::grib::Result;

/// Product definition section (edition 1 section 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDefinitionSection {
    /// Parameter table version number
    pub table_version: u8,
    /// Identification of originating/generating centre (see Common Code Table C-1)
    pub centre: u8,
    pub process: u8,
    /// Grid identification (see Table B)
    pub grid_id: u8,
    /// Flag specifying the presence or absence of a GDS or a BMS
    pub flags: u8,
    /// Indicator of parameter and units (see Table 2)
    pub parameter: u8,
    /// Indicator of type of level or layer (see Table 3)
    pub level_type: u8,
    pub level: u16,
    pub ref_time: Option<DateTime<Utc>>,
    /// Forecast time unit (see Table 4)
    pub time_unit: u8,
    pub p1: u8,
    pub p2: u8,
    /// Time range indicator (see Table 5)
    pub time_range: u8,
    pub num_in_average: u16,
    pub num_missing: u8,
    pub subcentre: u8,
    /// Units decimal scale factor (D)
    pub decimal_scale_factor: i16,
    #[serde(skip)]
    pub forecast_time: Option<Duration>,
}

impl ProductDefinitionSection {
    pub fn has_gds(&self) -> bool {
        self.flags & 0x80 != 0
    }

    pub fn has_bms(&self) -> bool {
        self.flags & 0x40 != 0
    }

    /// Decodes the section from octet 4 onwards.
    pub(crate) fn decode<R: Read>(cursor: &mut BitCursor<R>) -> Result<Self> {
        let table_version = cursor.read_u8()?;
        let centre = cursor.read_u8()?;
        let process = cursor.read_u8()?;
        let grid_id = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let parameter = cursor.read_u8()?;
        let level_type = cursor.read_u8()?;
        let level = cursor.read_u16()?;
        let mut date = [0; 5];
        cursor.read_exact(&mut date)?;
        let time_unit = cursor.read_u8()?;
        let p1 = cursor.read_u8()?;
        let p2 = cursor.read_u8()?;
        let time_range = cursor.read_u8()?;
        let num_in_average = cursor.read_u16()?;
        let num_missing = cursor.read_u8()?;
        let century = cursor.read_u8()?;
        let subcentre = cursor.read_u8()?;
        let decimal_scale_factor = cursor.read_i16()?;

        let year = (century as i32 - 1) * 100 + date[0] as i32;
        let period = match time_range {
            // P1 occupies octets 19 and 20
            10 => (p1 as i64) << 8 | p2 as i64,
            2..=5 => p2 as i64,
            _ => p1 as i64,
        };

        Ok(Self {
            table_version,
            centre,
            process,
            grid_id,
            flags,
            parameter,
            level_type,
            level,
            ref_time: ref_time(year, date[1], date[2], date[3], date[4], 0),
            time_unit,
            p1,
            p2,
            time_range,
            num_in_average,
            num_missing,
            subcentre,
            decimal_scale_factor,
            forecast_time: grib1_duration(time_unit, period),
        })
    }

    /// Identification equivalent to an edition 2 section 1.
    pub fn identification(&self) -> Identification {
        Identification {
            centre_id: self.centre as u16,
            subcentre_id: self.subcentre as u16,
            master_table_version: self.table_version,
            local_table_version: 0,
            ref_time_significance: 1,
            ref_time: self.ref_time,
            prod_status: u8::MAX,
            data_type: u8::MAX,
        }
    }
}

/// Table 4 differs from code table 4.4 for quarter and half hours and seconds.
fn grib1_duration(unit: u8, value: i64) -> Option<Duration> {
    let minutes = match unit {
        13 => value.checked_mul(15),
        14 => value.checked_mul(30),
        254 => return forecast_duration(13, value),
        unit => return forecast_duration(unit, value),
    };
    match minutes {
        Some(minutes) => forecast_duration(0, minutes),
        None => {
            warn!("Forecast time {} in unit `{}` is out of range.", value, unit);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::io::Cursor;

    fn pds_body(centre: u8, flags: u8, decimal_scale: [u8; 2]) -> Vec<u8> {
        let mut body = vec![128, centre, 145, 255, flags, 167, 1, 0, 0];
        body.extend([21, 10, 21, 12, 0, 1, 6, 0, 0, 0, 0, 0, 21, 0]);
        body.extend(decimal_scale);
        body
    }

    #[test]
    fn decodes_product_definition() {
        let body = pds_body(98, 0xc0, [0x80, 0x02]);
        let pds = ProductDefinitionSection::decode(&mut BitCursor::new(Cursor::new(body))).unwrap();
        assert!(pds.has_gds() && pds.has_bms());
        assert_eq!(pds.parameter, 167);
        assert_eq!(pds.decimal_scale_factor, -2);
        assert_eq!(pds.forecast_time, Some(Duration::hours(6)));
        assert_eq!(
            pds.ref_time,
            Some(Utc.from_utc_datetime(
                &NaiveDate::from_ymd_opt(2021, 10, 21)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
            ))
        );
        assert_eq!(pds.identification().centre_id, 98);
    }

    #[test]
    fn long_p1_for_time_range_10() {
        let mut body = pds_body(7, 0x80, [0, 0]);
        body[15] = 0x01;
        body[16] = 0x2c;
        body[17] = 10;
        let pds = ProductDefinitionSection::decode(&mut BitCursor::new(Cursor::new(body))).unwrap();
        assert!(!pds.has_bms());
        assert_eq!(pds.forecast_time, Some(Duration::hours(300)));
    }

    #[test]
    fn table_4_units() {
        assert_eq!(grib1_duration(254, 90), Some(Duration::seconds(90)));
        assert_eq!(grib1_duration(13, 2), Some(Duration::minutes(30)));
        assert_eq!(grib1_duration(14, i64::MAX), None);
    }
}
