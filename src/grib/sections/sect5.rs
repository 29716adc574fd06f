use std::io::Read;

use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::{
    ComplexPacking, GroupDefinition, Packing, SimplePacking, SpatialDifferencing,
};
use crate::grib::{RecordError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRepresentation {
    /// Number of values packed in the data section
    pub num_values: usize,
    /// Data Representation Template Number (edition 1: 0 for grid point simple packing)
    pub template_number: u16,
    pub packing: Packing,
}

impl DataRepresentation {
    /// Decodes a section 5 body, octet 6 onwards.
    pub(crate) fn decode<R: Read>(cursor: &mut BitCursor<R>) -> Result<Self> {
        let num_values = cursor.read_u32()? as usize;
        let template_number = cursor.read_u16()?;

        let packing = match template_number {
            0 => Packing::Simple(read_simple(cursor)?),
            2 => Packing::Complex(read_complex(cursor)?),
            3 => {
                let complex = read_complex(cursor)?;
                Packing::ComplexSpatialDiff(
                    complex,
                    SpatialDifferencing {
                        order: cursor.read_u8()?,
                        descriptor_octets: cursor.read_u8()?,
                    },
                )
            }
            4 => Packing::Ieee {
                precision: cursor.read_u8()?,
            },
            40 => Packing::Jpeg2000 {
                simple: read_simple(cursor)?,
                compression_type: cursor.read_u8()?,
                compression_ratio: cursor.read_u8()?,
            },
            41 => Packing::Png(read_simple(cursor)?),
            n => {
                return Err(RecordError::UnsupportedTemplate {
                    section: 5,
                    template: n,
                    reason: String::from("no decoder for this data representation template"),
                }
                .into())
            }
        };

        debug!(
            "Data representation template 5.{} : {} values, {}",
            template_number,
            num_values,
            packing.name()
        );

        Ok(Self {
            num_values,
            template_number,
            packing,
        })
    }
}

fn read_simple<R: Read>(cursor: &mut BitCursor<R>) -> Result<SimplePacking> {
    Ok(SimplePacking {
        reference_value: cursor.read_ieee_f32()? as f64,
        binary_scale_factor: cursor.read_i16()?,
        decimal_scale_factor: cursor.read_i16()?,
        num_bits: cursor.read_u8()?,
        values_type: cursor.read_u8()?,
    })
}

fn read_complex<R: Read>(cursor: &mut BitCursor<R>) -> Result<ComplexPacking> {
    Ok(ComplexPacking {
        simple: read_simple(cursor)?,
        group_method: cursor.read_u8()?,
        missing_management: cursor.read_u8()?,
        primary_missing: cursor.read_u32()?,
        secondary_missing: cursor.read_u32()?,
        groups: GroupDefinition {
            num_groups: cursor.read_u32()? as usize,
            widths_reference: cursor.read_u8()?,
            widths_num_bits: cursor.read_u8()?,
            lengths_reference: cursor.read_u32()?,
            lengths_increment: cursor.read_u8()?,
            last_length: cursor.read_u32()?,
            lengths_num_bits: cursor.read_u8()?,
        },
    })
}
