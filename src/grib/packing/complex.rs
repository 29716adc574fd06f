use std::io::Read;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::groups::{self, Group};
use crate::grib::packing::spatial_diff::{SpatialDiffDecodeIterator, SpatialDiffSeeds};
use crate::grib::packing::{malformed, ComplexPacking, SpatialDifferencing};
use crate::grib::RecordError;

/// Codes flagged as missing by the missing value management of a group.
#[derive(Debug, Clone, Copy)]
struct MissingCodes {
    primary: Option<u32>,
    secondary: Option<u32>,
}

impl MissingCodes {
    /// Highest codes of a `width` bits field, by management mode (Code Table 5.5).
    fn for_width(mode: u8, width: u32) -> Self {
        let max = if width == 0 {
            0
        } else {
            (((1u64 << width) - 1) & u32::MAX as u64) as u32
        };
        match mode {
            1 => Self {
                primary: Some(max),
                secondary: None,
            },
            2 => Self {
                primary: Some(max),
                secondary: max.checked_sub(1),
            },
            _ => Self {
                primary: None,
                secondary: None,
            },
        }
    }

    fn is_missing(&self, code: u32) -> bool {
        self.primary == Some(code) || self.secondary == Some(code)
    }
}

/// Unpacks the packed integers of templates 5.2 and 5.3, before scaling:
/// `None` marks values flagged by the missing value management.
pub(crate) fn decode<R: Read>(
    cursor: &mut BitCursor<R>,
    packing: &ComplexPacking,
    num_values: usize,
    differencing: Option<&SpatialDifferencing>,
) -> Result<Vec<Option<i64>>, RecordError> {
    if packing.missing_management > 2 {
        return Err(RecordError::UnsupportedTemplate {
            section: 5,
            template: if differencing.is_some() { 3 } else { 2 },
            reason: format!(
                "missing value management {} does not exist",
                packing.missing_management
            ),
        });
    }

    let seeds = match differencing {
        Some(differencing) => Some(SpatialDiffSeeds::decode(cursor, differencing)?),
        None => None,
    };

    let groups = groups::decode(cursor, packing, num_values)?;
    let packed = unpack_groups(cursor, packing, &groups, num_values)?;

    match seeds {
        Some(seeds) if seeds.apply() => {
            SpatialDiffDecodeIterator::new(packed.into_iter(), seeds).collect()
        }
        _ => Ok(packed),
    }
}

fn unpack_groups<R: Read>(
    cursor: &mut BitCursor<R>,
    packing: &ComplexPacking,
    groups: &[Group],
    num_values: usize,
) -> Result<Vec<Option<i64>>, RecordError> {
    let mode = packing.missing_management;
    // Constant groups are missing when their reference carries a missing code
    // of the reference width.
    let reference_codes = MissingCodes::for_width(mode, packing.simple.num_bits as u32);

    let mut values = Vec::with_capacity(num_values);
    for group in groups {
        if group.width == 0 {
            let value = if mode != 0 && reference_codes.is_missing(group.reference) {
                None
            } else {
                Some(group.reference as i64)
            };
            values.extend(std::iter::repeat(value).take(group.length));
            continue;
        }

        let codes = MissingCodes::for_width(mode, group.width);
        for _ in 0..group.length {
            let code = cursor
                .read_bits(group.width)
                .map_err(malformed("packed values"))?;
            values.push(if codes.is_missing(code) {
                None
            } else {
                Some(group.reference as i64 + code as i64)
            });
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grib::packing::tests::packing;

    // groups: ref 5 width 2 length 3, ref 9 width 0 length 4
    const GROUPS: [u8; 3] = [0x59, 0b1000_0000, 0b0100_0000];

    #[test]
    fn unpacks_groups_with_constant_group() {
        let mut payload = GROUPS.to_vec();
        payload.push(0b00_01_10_00);
        let mut cursor = BitCursor::new(&payload[..]);
        let values = decode(&mut cursor, &packing(4, 2, 2, 3, 4), 7, None).unwrap();
        assert_eq!(
            values,
            vec![Some(5), Some(6), Some(7), Some(9), Some(9), Some(9), Some(9)]
        );
    }

    #[test]
    fn primary_missing_uses_highest_code() {
        let mut payload = GROUPS.to_vec();
        payload.push(0b11_01_10_00);
        let mut complex = packing(4, 2, 2, 3, 4);
        complex.missing_management = 1;
        let mut cursor = BitCursor::new(&payload[..]);
        let values = decode(&mut cursor, &complex, 7, None).unwrap();
        assert_eq!(values[..3], [None, Some(6), Some(7)]);
    }

    #[test]
    fn primary_and_secondary_missing() {
        let mut payload = GROUPS.to_vec();
        payload.push(0b11_10_01_00);
        let mut complex = packing(4, 2, 2, 3, 4);
        complex.missing_management = 2;
        let mut cursor = BitCursor::new(&payload[..]);
        let values = decode(&mut cursor, &complex, 7, None).unwrap();
        assert_eq!(values[..3], [None, None, Some(6)]);
    }

    #[test]
    fn constant_group_with_missing_reference() {
        // refs 5, 15 (all ones on 4 bits)
        let payload = [0x5f, 0b1000_0000, 0b0100_0000, 0b00_01_10_00];
        let mut complex = packing(4, 2, 2, 3, 4);
        complex.missing_management = 1;
        let mut cursor = BitCursor::new(&payload[..]);
        let values = decode(&mut cursor, &complex, 7, None).unwrap();
        assert_eq!(values[3..], [None, None, None, None]);
    }

    #[test]
    fn truncated_values_are_malformed() {
        let mut cursor = BitCursor::new(&GROUPS[..]);
        assert!(matches!(
            decode(&mut cursor, &packing(4, 2, 2, 3, 4), 7, None),
            Err(RecordError::MalformedPacking(_))
        ));
    }
}
