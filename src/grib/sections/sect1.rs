use std::io::Read;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identification {
    /// Identification of originating/generating centre (see Common Code Table C-1)
    pub centre_id: u16,
    /// Identification of originating/generating sub-centre (allocated by originating/ generating centre)
    pub subcentre_id: u16,
    /// GRIB Master Tables Version Number (see Code Table 1.0)
    pub master_table_version: u8,
    /// GRIB Local Tables Version Number (see Code Table 1.1)
    pub local_table_version: u8,
    /// Significance of Reference Time (see Code Table 1.2)
    pub ref_time_significance: u8,
    /// Reference time of data, `None` when the encoded date does not exist
    pub ref_time: Option<DateTime<Utc>>,
    /// Production status of processed data in this GRIB message
    /// (see Code Table 1.3)
    pub prod_status: u8,
    /// Type of processed data in this GRIB message (see Code Table 1.4)
    pub data_type: u8,
}

impl Identification {
    pub(crate) fn decode<R: Read>(cursor: &mut BitCursor<R>) -> Result<Self> {
        let centre_id = cursor.read_u16()?;
        let subcentre_id = cursor.read_u16()?;
        let master_table_version = cursor.read_u8()?;
        let local_table_version = cursor.read_u8()?;
        let ref_time_significance = cursor.read_u8()?;
        let year = cursor.read_u16()?;
        let mut fields = [0; 5];
        cursor.read_exact(&mut fields)?;

        Ok(Self {
            centre_id,
            subcentre_id,
            master_table_version,
            local_table_version,
            ref_time_significance,
            ref_time: ref_time(
                year as i32,
                fields[0],
                fields[1],
                fields[2],
                fields[3],
                fields[4],
            ),
            prod_status: cursor.read_u8()?,
            data_type: cursor.read_u8()?,
        })
    }
}

pub(crate) fn ref_time(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> Option<DateTime<Utc>> {
    let time = NaiveDate::from_ymd_opt(year, month.into(), day.into())
        .and_then(|date| date.and_hms_opt(hour.into(), minute.into(), second.into()));
    match time {
        Some(time) => Some(Utc.from_utc_datetime(&time)),
        None => {
            warn!(
                "Invalid reference time {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            None
        }
    }
}
