use std::io::Read;

use num::ToPrimitive;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::{malformed, SimplePacking};
use crate::grib::RecordError;

/// Applies the reference value and scale factors to packed integers.
pub(crate) struct SimpleDecoderIterator<I: Iterator<Item = N>, N: ToPrimitive> {
    packed_iter: I,
    reference_value: f64,
    binary_scale: f64,
    decimal_scale: f64,
}

impl<I: Iterator<Item = N>, N: ToPrimitive> SimpleDecoderIterator<I, N> {
    pub(crate) fn new(packed_iter: I, packing: &SimplePacking) -> Self {
        Self {
            packed_iter,
            reference_value: packing.reference_value,
            binary_scale: 2_f64.powi(packing.binary_scale_factor as i32),
            decimal_scale: 10_f64.powi(-(packing.decimal_scale_factor as i32)),
        }
    }
}

impl<I: Iterator<Item = N>, N: ToPrimitive> Iterator for SimpleDecoderIterator<I, N> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let encoded = self.packed_iter.next()?.to_f64()?;
        Some((self.reference_value + encoded * self.binary_scale) * self.decimal_scale)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.packed_iter.size_hint()
    }
}

/// Reads `count` values of `num_bits` bits each. A zero width spends no bit:
/// every value is the reference value.
pub(crate) fn decode<R: Read>(
    cursor: &mut BitCursor<R>,
    packing: &SimplePacking,
    count: usize,
) -> Result<Vec<f64>, RecordError> {
    if packing.num_bits == 0 {
        return Ok(vec![packing.constant(); count]);
    }
    if packing.num_bits > 32 {
        return Err(RecordError::MalformedPacking(format!(
            "{} bits per value is more than simple packing allows",
            packing.num_bits
        )));
    }

    let packed = (0..count)
        .map(|_| cursor.read_bits(packing.num_bits as u32))
        .collect::<Result<Vec<u32>, _>>()
        .map_err(malformed(&format!(
            "payload too short for {} values of {} bits",
            count, packing.num_bits
        )))?;

    Ok(SimpleDecoderIterator::new(packed.into_iter(), packing).collect())
}
