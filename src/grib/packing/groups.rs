use std::io::Read;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::{malformed, ComplexPacking};
use crate::grib::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Group {
    pub(crate) reference: u32,
    pub(crate) width: u32,
    pub(crate) length: usize,
}

fn read_block<R: Read>(
    cursor: &mut BitCursor<R>,
    count: usize,
    num_bits: u8,
    what: &str,
) -> Result<Vec<u32>, RecordError> {
    if num_bits > 32 {
        return Err(RecordError::MalformedPacking(format!(
            "{} packed on {} bits",
            what, num_bits
        )));
    }
    let block = (0..count)
        .map(|_| cursor.read_bits(num_bits as u32))
        .collect::<Result<Vec<u32>, _>>()
        .map_err(malformed(what))?;
    // every block starts on an octet
    cursor.align();
    Ok(block)
}

/// Reads the group references, widths and lengths blocks that precede the
/// packed values, and checks the lengths add up to `num_values`.
pub(crate) fn decode<R: Read>(
    cursor: &mut BitCursor<R>,
    packing: &ComplexPacking,
    num_values: usize,
) -> Result<Vec<Group>, RecordError> {
    let definition = &packing.groups;
    let ng = definition.num_groups;
    if ng == 0 {
        return Err(RecordError::MalformedPacking(String::from(
            "complex packing without groups",
        )));
    }

    let references = read_block(cursor, ng, packing.simple.num_bits, "group references")?;
    let widths = read_block(cursor, ng, definition.widths_num_bits, "group widths")?;
    let lengths = read_block(cursor, ng, definition.lengths_num_bits, "group lengths")?;

    let groups: Vec<Group> = references
        .into_iter()
        .zip(widths)
        .zip(lengths)
        .enumerate()
        .map(|(n, ((reference, width), length))| Group {
            reference,
            width: definition.widths_reference as u32 + width,
            length: if n == ng - 1 {
                definition.last_length as usize
            } else {
                definition.lengths_reference as usize
                    + definition.lengths_increment as usize * length as usize
            },
        })
        .collect();

    let total: usize = groups.iter().map(|g| g.length).sum();
    if total != num_values {
        return Err(RecordError::MalformedPacking(format!(
            "{} groups hold {} values, {} declared",
            ng, total, num_values
        )));
    }
    if let Some(group) = groups.iter().find(|g| g.width > 32) {
        return Err(RecordError::MalformedPacking(format!(
            "group width {} exceeds 32 bits",
            group.width
        )));
    }

    Ok(groups)
}
