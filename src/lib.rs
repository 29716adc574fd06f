#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod grib;

pub use crate::config::DecoderConfig;
pub use crate::grib::{from_reader, GribError, GribReader, Message, Record, RecordError};
