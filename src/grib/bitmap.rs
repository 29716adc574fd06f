use std::io::Read;

use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::{RecordError, Result};

/// Bitmap indicator: a bitmap follows.
pub const BITMAP_FOLLOWS: u8 = 0;
/// Bitmap indicator: the bitmap previously defined in the message applies.
pub const BITMAP_PREVIOUS: u8 = 254;
/// Bitmap indicator: no bitmap, every point has a value.
pub const BITMAP_NONE: u8 = 255;

/// Where the bitmap of a record lives, resolved while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitmapRef {
    Absent,
    /// Section 6 starting at `offset`, `length` octets long.
    Grib2 { offset: u64, length: u64 },
    /// Bit map section starting at `offset`, `length` octets long.
    Grib1 { offset: u64, length: u64 },
}

/// Presence mask of the grid points, MSB first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bitmap {
    /// Every point is present.
    Absent,
    Bits { bytes: Vec<u8>, len: usize },
}

impl Bitmap {
    pub fn from_bits(bytes: Vec<u8>, len: usize) -> Self {
        let len = len.min(bytes.len() * 8);
        Bitmap::Bits { bytes, len }
    }

    /// Edition 2 section 6, from octet 6 (the bitmap indicator) onwards.
    pub fn decode<R: Read>(
        cursor: &mut BitCursor<R>,
        declared_length: u64,
        num_points: usize,
    ) -> Result<Self> {
        match cursor.read_u8()? {
            BITMAP_FOLLOWS => {
                let num_bytes = declared_length.saturating_sub(6) as usize;
                let bytes = cursor.read_bytes(num_bytes)?;
                Ok(Bitmap::from_bits(bytes, num_bytes * 8))
            }
            BITMAP_NONE => Ok(Bitmap::Absent),
            BITMAP_PREVIOUS => Err(RecordError::MalformedPacking(String::from(
                "bitmap refers to a previous bitmap but none was defined",
            ))
            .into()),
            indicator => {
                warn!(
                    "Predefined bitmap {} is not supported, all {} points taken as present",
                    indicator, num_points
                );
                Ok(Bitmap::Absent)
            }
        }
    }

    /// Edition 1 bit map section, from octet 4 (unused bits) onwards.
    pub fn decode_grib1<R: Read>(
        cursor: &mut BitCursor<R>,
        declared_length: u64,
        num_points: usize,
    ) -> Result<Self> {
        let unused_bits = cursor.read_u8()? as usize;
        let table_reference = cursor.read_u16()?;
        if table_reference != 0 {
            warn!(
                "Predefined bitmap {} is not supported, all {} points taken as present",
                table_reference, num_points
            );
            return Ok(Bitmap::Absent);
        }
        let num_bytes = declared_length.saturating_sub(6) as usize;
        let bytes = cursor.read_bytes(num_bytes)?;
        Ok(Bitmap::from_bits(bytes, (num_bytes * 8).saturating_sub(unused_bits)))
    }

    pub fn is_present(&self, index: usize) -> bool {
        match self {
            Bitmap::Absent => true,
            Bitmap::Bits { bytes, len } => {
                index < *len && bytes[index / 8] & (0x80 >> (index % 8)) != 0
            }
        }
    }

    /// Number of present points among the first `npts`.
    pub fn count_present(&self, npts: usize) -> std::result::Result<usize, RecordError> {
        match self {
            Bitmap::Absent => Ok(npts),
            Bitmap::Bits { len, .. } if *len < npts => Err(RecordError::MalformedPacking(
                format!("bitmap of {} bits for {} points", len, npts),
            )),
            Bitmap::Bits { .. } => Ok((0..npts).filter(|&i| self.is_present(i)).count()),
        }
    }

    /// Spreads the values of the present points over all `npts` points.
    pub fn expand(&self, values: Vec<Option<f64>>, npts: usize) -> Vec<Option<f64>> {
        match self {
            Bitmap::Absent => values,
            Bitmap::Bits { .. } => {
                let mut values = values.into_iter();
                (0..npts)
                    .map(|i| {
                        if self.is_present(i) {
                            values.next().flatten()
                        } else {
                            None
                        }
                    })
                    .collect()
            }
        }
    }
}
