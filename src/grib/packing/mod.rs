//! Reconstruction of the field values from the packed payload of a data
//! section, one codec per data representation template.

use serde::Serialize;

use crate::grib::bitmap::Bitmap;
use crate::grib::cursor::BitCursor;
use crate::grib::RecordError;

mod complex;
mod groups;
mod ieee;
mod jpeg2000;
mod png;
mod simple;
mod spatial_diff;

pub use jpeg2000::Jpeg2000Codec;

/// Reference value and scale factors shared by every grid point packing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplePacking {
    /// Reference value (R)
    pub reference_value: f64,
    /// Binary scale factor (E)
    pub binary_scale_factor: i16,
    /// Decimal scale factor (D)
    pub decimal_scale_factor: i16,
    /// Number of bits used for each packed value
    pub num_bits: u8,
    /// Type of original field values (see Code Table 5.1)
    pub values_type: u8,
}

impl SimplePacking {
    /// `(R + X * 2^E) * 10^-D`
    pub fn scale(&self, packed: f64) -> f64 {
        (self.reference_value + packed * 2_f64.powi(self.binary_scale_factor as i32))
            * 10_f64.powi(-(self.decimal_scale_factor as i32))
    }

    /// Value of every point when no bit is spent per value: the reference
    /// value itself, unscaled.
    pub fn constant(&self) -> f64 {
        self.reference_value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDefinition {
    pub num_groups: usize,
    pub widths_reference: u8,
    pub widths_num_bits: u8,
    pub lengths_reference: u32,
    pub lengths_increment: u8,
    /// True length of the last group
    pub last_length: u32,
    pub lengths_num_bits: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexPacking {
    pub simple: SimplePacking,
    pub group_method: u8,
    /// Missing value management (see Code Table 5.5)
    pub missing_management: u8,
    pub primary_missing: u32,
    pub secondary_missing: u32,
    pub groups: GroupDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpatialDifferencing {
    pub order: u8,
    /// Number of octets of each extra descriptor (first values and minimum)
    pub descriptor_octets: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Packing {
    /// Template 5.0, and the edition 1 grid point simple packing
    Simple(SimplePacking),
    /// Template 5.2
    Complex(ComplexPacking),
    /// Template 5.3
    ComplexSpatialDiff(ComplexPacking, SpatialDifferencing),
    /// Template 5.4, 1 for 32 bits, 2 for 64 bits
    Ieee { precision: u8 },
    /// Template 5.40
    Jpeg2000 {
        simple: SimplePacking,
        compression_type: u8,
        compression_ratio: u8,
    },
    /// Template 5.41
    Png(SimplePacking),
}

impl Packing {
    pub fn name(&self) -> &'static str {
        match self {
            Packing::Simple(_) => "grid_simple",
            Packing::Complex(_) => "grid_complex",
            Packing::ComplexSpatialDiff(..) => "grid_complex_spatial_differencing",
            Packing::Ieee { .. } => "grid_ieee",
            Packing::Jpeg2000 { .. } => "grid_jpeg",
            Packing::Png(_) => "grid_png",
        }
    }
}

pub(crate) fn malformed<E: std::fmt::Display>(what: &str) -> impl FnOnce(E) -> RecordError + '_ {
    move |e| RecordError::MalformedPacking(format!("{}: {}", what, e))
}

/// Decodes `payload`, the data section octets after its header, into one
/// entry per grid point: bitmap-absent points are `None` and consume nothing
/// from the payload.
pub fn decode_values(
    payload: &[u8],
    packing: &Packing,
    num_values: usize,
    bitmap: &Bitmap,
    npts: usize,
    jpeg2000: Option<&dyn Jpeg2000Codec>,
) -> Result<Vec<Option<f64>>, RecordError> {
    let present = bitmap.count_present(npts)?;
    if present != num_values {
        debug!(
            "{} values declared, {} points present in the bitmap",
            num_values, present
        );
    }

    let mut cursor = BitCursor::new(payload);
    let values: Vec<Option<f64>> = match packing {
        Packing::Simple(simple) => simple::decode(&mut cursor, simple, present)?
            .into_iter()
            .map(Some)
            .collect(),
        Packing::Complex(complex) => {
            let packed = complex::decode(&mut cursor, complex, num_values, None)?;
            scale_packed(&complex.simple, packed)
        }
        Packing::ComplexSpatialDiff(complex, differencing) => {
            let packed = complex::decode(&mut cursor, complex, num_values, Some(differencing))?;
            scale_packed(&complex.simple, packed)
        }
        Packing::Ieee { precision } => ieee::decode(&mut cursor, *precision, present)?
            .into_iter()
            .map(Some)
            .collect(),
        Packing::Jpeg2000 { simple, .. } => jpeg2000::decode(payload, simple, present, jpeg2000)?
            .into_iter()
            .map(Some)
            .collect(),
        Packing::Png(simple) => png::decode(payload, simple, present)?
            .into_iter()
            .map(Some)
            .collect(),
    };

    if values.len() != present {
        return Err(RecordError::MalformedPacking(format!(
            "{} values decoded for {} present points",
            values.len(),
            present
        )));
    }

    Ok(bitmap.expand(values, npts))
}

fn scale_packed(simple: &SimplePacking, packed: Vec<Option<i64>>) -> Vec<Option<f64>> {
    packed
        .into_iter()
        .map(|v| v.map(|v| simple.scale(v as f64)))
        .collect()
}
