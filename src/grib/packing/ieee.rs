use std::io::Read;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::malformed;
use crate::grib::RecordError;

/// Template 5.4: values stored as IEEE floats, 1 for 32 bits, 2 for 64 bits.
pub(crate) fn decode<R: Read>(
    cursor: &mut BitCursor<R>,
    precision: u8,
    count: usize,
) -> Result<Vec<f64>, RecordError> {
    let values: std::io::Result<Vec<f64>> = match precision {
        1 => (0..count)
            .map(|_| cursor.read_ieee_f32().map(f64::from))
            .collect(),
        2 => (0..count).map(|_| cursor.read_ieee_f64()).collect(),
        n => {
            return Err(RecordError::UnsupportedTemplate {
                section: 5,
                template: 4,
                reason: format!("IEEE precision {} is not supported", n),
            })
        }
    };
    values.map_err(malformed("IEEE payload"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_and_double_precision() {
        let single: Vec<u8> = [1.5f32, -2.25].iter().flat_map(|v| v.to_be_bytes()).collect();
        let mut cursor = BitCursor::new(&single[..]);
        assert_eq!(decode(&mut cursor, 1, 2).unwrap(), vec![1.5, -2.25]);

        let double: Vec<u8> = 0.1f64.to_be_bytes().to_vec();
        let mut cursor = BitCursor::new(&double[..]);
        assert_eq!(decode(&mut cursor, 2, 1).unwrap(), vec![0.1]);
    }

    #[test]
    fn quadruple_precision_is_unsupported() {
        let empty: &[u8] = &[];
        let mut cursor = BitCursor::new(empty);
        assert!(matches!(
            decode(&mut cursor, 3, 1),
            Err(RecordError::UnsupportedTemplate { template: 4, .. })
        ));
    }
}
