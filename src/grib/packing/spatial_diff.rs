use std::io::Read;

use crate::grib::cursor::BitCursor;
use crate::grib::packing::{malformed, SpatialDifferencing};
use crate::grib::RecordError;

/// Extra descriptors written ahead of the groups by template 5.3: the first
/// one or two original values and the overall minimum of the differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpatialDiffSeeds {
    order: u8,
    octets: u8,
    first: i64,
    second: i64,
    minimum: i64,
}

impl SpatialDiffSeeds {
    pub(crate) fn decode<R: Read>(
        cursor: &mut BitCursor<R>,
        differencing: &SpatialDifferencing,
    ) -> Result<Self, RecordError> {
        let order = differencing.order;
        if order != 1 && order != 2 {
            return Err(RecordError::UnsupportedTemplate {
                section: 5,
                template: 3,
                reason: format!("spatial differencing of order {}", order),
            });
        }

        let octets = differencing.descriptor_octets;
        let mut seeds = Self {
            order,
            octets,
            first: 0,
            second: 0,
            minimum: 0,
        };
        if octets == 0 {
            return Ok(seeds);
        }

        let mut read = || {
            cursor
                .read_int_octets(octets as usize)
                .map_err(malformed("spatial differencing descriptors"))
        };
        seeds.first = read()?;
        if order == 2 {
            seeds.second = read()?;
        }
        seeds.minimum = read()?;
        Ok(seeds)
    }

    /// Without descriptor octets the values were packed undifferenced.
    pub(crate) fn apply(&self) -> bool {
        self.octets != 0
    }
}

/// Undoes first or second order differencing over the non-missing values,
/// passing missing ones through untouched. A reconstruction leaving the `i64`
/// range is a malformed payload.
pub(crate) struct SpatialDiffDecodeIterator<I> {
    iter: I,
    seeds: SpatialDiffSeeds,
    count: usize,
    prev1: i64,
    prev2: i64,
}

impl<I> SpatialDiffDecodeIterator<I> {
    pub(crate) fn new(iter: I, seeds: SpatialDiffSeeds) -> Self {
        Self {
            iter,
            seeds,
            count: 0,
            prev1: 0,
            prev2: 0,
        }
    }

    fn undo(&self, v: i64, count: usize) -> Option<i64> {
        let SpatialDiffSeeds {
            order,
            first,
            second,
            minimum,
            ..
        } = self.seeds;
        match (order, count) {
            (_, 0) => Some(first),
            (2, 1) => Some(second),
            (1, _) => v.checked_add(minimum)?.checked_add(self.prev1),
            (_, _) => v
                .checked_add(minimum)?
                .checked_add(self.prev1.checked_mul(2)?)?
                .checked_sub(self.prev2),
        }
    }
}

impl<I: Iterator<Item = Option<i64>>> Iterator for SpatialDiffDecodeIterator<I> {
    type Item = Result<Option<i64>, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = match self.iter.next()? {
            Some(v) => v,
            None => return Some(Ok(None)),
        };

        let count = self.count;
        self.count += 1;

        let v = match self.undo(v, count) {
            Some(v) => v,
            None => {
                return Some(Err(RecordError::MalformedPacking(format!(
                    "spatial differencing overflows at value {}",
                    count
                ))))
            }
        };

        (self.prev2, self.prev1) = (self.prev1, v);
        Some(Ok(Some(v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(order: u8, first: i64, second: i64, minimum: i64) -> SpatialDiffSeeds {
        SpatialDiffSeeds {
            order,
            octets: 2,
            first,
            second,
            minimum,
        }
    }

    #[test]
    fn first_order_is_a_running_sum() {
        // original 10, 12, 11, 15: differences 2, -1, 4, minimum -1
        let packed = vec![Some(0), Some(3), Some(0), Some(5)];
        let values = SpatialDiffDecodeIterator::new(packed.into_iter(), seeds(1, 10, 0, -1))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(values, vec![Some(10), Some(12), Some(11), Some(15)]);
    }

    #[test]
    fn second_order_recurrence() {
        // original 1, 4, 9, 16, 25: second differences 2, 2, 2, minimum 2
        let packed = vec![Some(0), Some(0), Some(0), Some(0), Some(0)];
        let values = SpatialDiffDecodeIterator::new(packed.into_iter(), seeds(2, 1, 4, 2))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            values,
            vec![Some(1), Some(4), Some(9), Some(16), Some(25)]
        );
    }

    #[test]
    fn missing_values_are_skipped() {
        let packed = vec![Some(0), None, Some(3), None, Some(0)];
        let values = SpatialDiffDecodeIterator::new(packed.into_iter(), seeds(1, 10, 0, -1))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(values, vec![Some(10), None, Some(12), None, Some(11)]);
    }

    #[test]
    fn overflowing_reconstruction_is_malformed() {
        let packed = vec![Some(0), Some(1), Some(0)];
        let values: Vec<_> =
            SpatialDiffDecodeIterator::new(packed.into_iter(), seeds(1, i64::MAX, 0, 0)).collect();
        assert_eq!(values[0], Ok(Some(i64::MAX)));
        assert!(matches!(values[1], Err(RecordError::MalformedPacking(_))));

        let packed = vec![Some(0), Some(0), Some(0)];
        let result = SpatialDiffDecodeIterator::new(packed.into_iter(), seeds(2, 0, i64::MAX, 0))
            .collect::<Result<Vec<_>, _>>();
        assert!(matches!(result, Err(RecordError::MalformedPacking(_))));
    }

    #[test]
    fn reads_sign_magnitude_descriptors() {
        let payload: &[u8] = &[0x00, 0x0a, 0x00, 0x04, 0x80, 0x02];
        let mut cursor = BitCursor::new(payload);
        let decoded = SpatialDiffSeeds::decode(
            &mut cursor,
            &SpatialDifferencing {
                order: 2,
                descriptor_octets: 2,
            },
        )
        .unwrap();
        assert_eq!(decoded, seeds(2, 10, 4, -2));
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn third_order_is_unsupported() {
        let payload: &[u8] = &[];
        let mut cursor = BitCursor::new(payload);
        assert!(matches!(
            SpatialDiffSeeds::decode(
                &mut cursor,
                &SpatialDifferencing {
                    order: 3,
                    descriptor_octets: 2
                }
            ),
            Err(RecordError::UnsupportedTemplate { .. })
        ));
    }
}
