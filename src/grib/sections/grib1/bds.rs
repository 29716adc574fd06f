use std::io::Read;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::{Packing, SimplePacking};
use crate::grib::sections::sect5::DataRepresentation;
use crate::grib::{RecordError, Result};

/// Octets 1 to 11 of the binary data section precede the packed data.
pub const BDS_HEADER_SIZE: u64 = 11;

const SPHERICAL_HARMONICS: u8 = 0x80;
const COMPLEX_PACKING: u8 = 0x40;
const INTEGER_VALUES: u8 = 0x20;

/// Decodes the binary data section header from octet 4 onwards.
/// `section_len` is the declared length of the whole section.
pub(crate) fn decode<R: Read>(
    cursor: &mut BitCursor<R>,
    section_len: u64,
    decimal_scale_factor: i16,
) -> Result<DataRepresentation> {
    let flags = cursor.read_u8()?;
    let binary_scale_factor = cursor.read_i16()?;
    let reference_value = cursor.read_ibm_f32()?;
    let num_bits = cursor.read_u8()?;

    if flags & (SPHERICAL_HARMONICS | COMPLEX_PACKING) != 0 {
        return Err(RecordError::UnsupportedTemplate {
            section: 4,
            template: (flags >> 4) as u16,
            reason: format!("binary data flags {:#010b}, only grid point simple packing is supported", flags),
        }
        .into());
    }

    let unused_bits = (flags & 0x0f) as u64;
    let data_bits = (section_len.saturating_sub(BDS_HEADER_SIZE) * 8).saturating_sub(unused_bits);
    let num_values = if num_bits > 0 {
        (data_bits / num_bits as u64) as usize
    } else {
        0
    };

    Ok(DataRepresentation {
        num_values,
        template_number: 0,
        packing: Packing::Simple(SimplePacking {
            reference_value,
            binary_scale_factor,
            decimal_scale_factor,
            num_bits,
            values_type: if flags & INTEGER_VALUES != 0 { 1 } else { 0 },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_simple_header() {
        // R = 1.0 in IBM single precision, E = -1, 12 bits, 4 unused bits
        let body = vec![0x04, 0x80, 0x01, 0x41, 0x10, 0x00, 0x00, 12];
        let dr = decode(&mut BitCursor::new(Cursor::new(body)), 11 + 5, 2).unwrap();
        assert_eq!(dr.num_values, 3);
        match dr.packing {
            Packing::Simple(simple) => {
                assert_eq!(simple.reference_value, 1.0);
                assert_eq!(simple.binary_scale_factor, -1);
                assert_eq!(simple.decimal_scale_factor, 2);
            }
            other => panic!("unexpected packing {:?}", other),
        }
    }

    #[test]
    fn spherical_harmonics_are_unsupported() {
        let body = vec![0x80, 0, 0, 0, 0, 0, 0, 8];
        assert!(matches!(
            decode(&mut BitCursor::new(Cursor::new(body)), 20, 0),
            Err(crate::grib::GribError::Record(RecordError::UnsupportedTemplate { section: 4, .. }))
        ));
    }
}
