use serde::Serialize;

use crate::grib::RecordError;

/// Scanning mode flag table (3.4 in edition 2, table 8 in edition 1).
/// Bits are numbered from the most significant one, bit 1 being `0x80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanningMode(pub u8);

impl ScanningMode {
    const I_NEGATIVE: u8 = 0x80;
    const J_POSITIVE: u8 = 0x40;
    const J_CONSECUTIVE: u8 = 0x20;
    const ALTERNATE_ROWS: u8 = 0x10;

    /// Validates the flags for the given edition; reserved bits are rejected.
    pub fn new(flags: u8, edition: u8) -> Result<Self, RecordError> {
        let reserved = match edition {
            1 => 0x1f,
            _ => 0x0f,
        };
        if flags & reserved != 0 {
            return Err(RecordError::UnsupportedTemplate {
                section: 3,
                template: flags as u16,
                reason: format!("unsupported scanning mode {:#010b}", flags),
            });
        }
        Ok(Self(flags))
    }

    /// Points of a row are scanned towards decreasing i (westward).
    pub fn i_negative(&self) -> bool {
        self.0 & Self::I_NEGATIVE != 0
    }

    /// Rows are scanned towards increasing j (northward).
    pub fn j_positive(&self) -> bool {
        self.0 & Self::J_POSITIVE != 0
    }

    /// Adjacent points are consecutive in j (column major).
    pub fn j_consecutive(&self) -> bool {
        self.0 & Self::J_CONSECUTIVE != 0
    }

    /// Every other row is scanned in the opposite direction.
    pub fn alternate_rows(&self) -> bool {
        self.0 & Self::ALTERNATE_ROWS != 0
    }

    pub fn i_sign(&self) -> f64 {
        if self.i_negative() {
            -1.0
        } else {
            1.0
        }
    }

    pub fn j_sign(&self) -> f64 {
        if self.j_positive() {
            1.0
        } else {
            -1.0
        }
    }
}

/// `(i, j)` offsets from the first grid point, in data order.
pub struct ScanOrder {
    ni: usize,
    nj: usize,
    mode: ScanningMode,
    k: usize,
}

impl ScanOrder {
    pub fn new(ni: usize, nj: usize, mode: ScanningMode) -> Self {
        Self { ni, nj, mode, k: 0 }
    }
}

impl Iterator for ScanOrder {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.k >= self.ni * self.nj {
            return None;
        }
        let k = self.k;
        self.k += 1;

        let (outer_len, inner_len) = if self.mode.j_consecutive() {
            (self.ni, self.nj)
        } else {
            (self.nj, self.ni)
        };
        let outer = k / inner_len;
        let mut inner = k % inner_len;
        if self.mode.alternate_rows() && outer % 2 == 1 {
            inner = inner_len - 1 - inner;
        }
        debug_assert!(outer < outer_len);

        if self.mode.j_consecutive() {
            Some((outer, inner))
        } else {
            Some((inner, outer))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.ni * self.nj - self.k.min(self.ni * self.nj);
        (rest, Some(rest))
    }
}
