//! GRIB edition 1 and 2 decoding: message framing, section decoders, grid
//! geometry, bitmaps and packing codecs.

pub mod assemble;
pub mod bitmap;
pub mod cursor;
pub mod grid;
pub mod packing;
pub mod reader;
pub mod sections;
mod utils;

use std::io::{Read, Seek};
use std::sync::Arc;

use serde::Serialize;

use crate::grib::bitmap::BitmapRef;
use crate::grib::sections::sect1::Identification;
use crate::grib::sections::sect3::GridDefinition;
use crate::grib::sections::sect5::DataRepresentation;
use crate::grib::sections::{Indicator, ProductDefinition, SectionRef};

pub use crate::grib::assemble::GridValues;
pub use crate::grib::reader::{GribReader, ScanState};
pub use crate::grib::utils::{ibm_to_f64, ieee_to_f32};

pub type Result<T, E = GribError> = std::result::Result<T, E>;

/// Message level failures. Once raised, the rest of the message is skipped.
#[derive(thiserror::Error, Debug)]
pub enum GribError {
    #[error("no GRIB message found in stream")]
    BadMagic,

    #[error("unsupported GRIB edition {0}")]
    UnsupportedEdition(u8),

    #[error("unexpected section {found}, expected {expected}")]
    UnexpectedSection { expected: String, found: u8 },

    #[error("truncated message at offset {offset}, possible corruption: {reason}")]
    TruncatedMessage { offset: u64, reason: String },

    #[error("section {section} length error: {reason}")]
    SectionLength { section: u8, reason: String },

    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Record level failures; they leave the other records of a message usable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
pub enum RecordError {
    #[error("unsupported template {section}.{template}: {reason}")]
    UnsupportedTemplate {
        section: u8,
        template: u16,
        reason: String,
    },

    #[error("inconsistent geometry: {0}")]
    InconsistentGeometry(String),

    #[error("malformed packing: {0}")]
    MalformedPacking(String),
}

/// Every message of a stream.
#[derive(Debug, Serialize)]
pub struct Grib {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Offset of the `GRIB` magic in the stream
    pub offset: u64,
    pub indicator: Indicator,
    pub identification: Identification,
    /// One entry per data section, in stream order.
    pub records: Vec<std::result::Result<Record, RecordError>>,
}

impl Message {
    pub fn end(&self) -> u64 {
        self.offset + self.indicator.total_length
    }
}

/// One data set of a message. Holds stream offsets, never payload; sections
/// repeated across the records of a message are shared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub edition: u8,
    pub grid_definition: Arc<GridDefinition>,
    pub product_definition: Arc<ProductDefinition>,
    pub data_representation: Arc<DataRepresentation>,
    pub bitmap: BitmapRef,
    pub data: SectionRef,
}

/// Reads every message of `reader`, failing on the first message level error.
pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Grib> {
    let messages = GribReader::new(reader)
        .messages()
        .collect::<Result<Vec<_>>>()?;
    Ok(Grib { messages })
}
