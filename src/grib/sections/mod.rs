use std::io;

use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::sections::grib1::ProductDefinitionSection;
use crate::grib::{GribError, RecordError, Result};

pub mod grib1;
pub mod sect1;
pub mod sect3;
pub mod sect4;
pub mod sect5;

pub(crate) const SECT0_IS_MAGIC: &[u8] = b"GRIB";
pub(crate) const SECT8_ES_MAGIC: &[u8] = b"7777";
pub(crate) const SECT8_ES_SIZE: u64 = SECT8_ES_MAGIC.len() as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    /// GRIB edition number (1 or 2)
    pub edition: u8,
    /// Discipline - GRIB Master Table Number (see Code Table 0.0), edition 2 only
    pub discipline: Option<u8>,
    /// Total length of GRIB message in octets (including Section 0)
    pub total_length: u64,
}

impl Indicator {
    /// Octets taken by section 0 in this edition.
    pub fn size(&self) -> u64 {
        match self.edition {
            1 => 8,
            _ => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset of the first octet of the section in the stream
    pub offset: u64,
    /// Length : Length of the section in octets
    pub size: u64,
    /// Number : Number of the section (edition 2 only, 0 in edition 1)
    pub number: u8,
}

impl SectionHeader {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Byte range of a section payload in the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionRef {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProductDefinition {
    Edition1(ProductDefinitionSection),
    Edition2(sect4::ProductDefinition),
}

impl ProductDefinition {
    /// `(discipline, category, number)` in edition 2, `(table version, 0, parameter)` in edition 1.
    pub fn parameter(&self) -> (u8, u8, u8) {
        match self {
            ProductDefinition::Edition1(pds) => (pds.table_version, 0, pds.parameter),
            ProductDefinition::Edition2(pd) => (
                pd.discipline,
                pd.product.parameter_category,
                pd.product.parameter_number,
            ),
        }
    }

    pub fn forecast_time(&self) -> Option<chrono::Duration> {
        match self {
            ProductDefinition::Edition1(pds) => pds.forecast_time,
            ProductDefinition::Edition2(pd) => pd.product.forecast_time,
        }
    }
}

/// Decodes a section body already loaded into memory; running out of body
/// octets is a section length error, never a truncated stream.
pub(crate) fn decode_body<T, F>(section: u8, body: Vec<u8>, decode: F) -> Result<T>
where
    F: FnOnce(&mut BitCursor<io::Cursor<Vec<u8>>>) -> Result<T>,
{
    let mut cursor = BitCursor::new(io::Cursor::new(body));
    decode(&mut cursor).map_err(|e| match e {
        GribError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => GribError::SectionLength {
            section,
            reason: String::from("template runs past the declared section length"),
        },
        e => e,
    })
}

/// Splits record level failures, which only disable the records using the
/// section, from structural failures, which abort the message.
pub(crate) fn record_level<T>(result: Result<T>) -> Result<std::result::Result<T, RecordError>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(GribError::Record(e)) => Ok(Err(e)),
        Err(e) => Err(e),
    }
}
