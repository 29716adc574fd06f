//! Edition 1 sections: product definition (PDS), grid description (GDS),
//! bit map (BMS) and binary data (BDS). Section lengths take three octets
//! and sections carry no number; their presence follows the PDS flags.

pub(crate) mod bds;
pub(crate) mod gds;
mod pds;

pub use bds::BDS_HEADER_SIZE;
pub use pds::ProductDefinitionSection;

/// Octets taken by the length of every edition 1 section.
pub const SECTION_LENGTH_SIZE: u64 = 3;
