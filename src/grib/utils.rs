pub(crate) trait GribInt<I> {
    fn as_grib_int(&self) -> I;
}

// Sign-magnitude: the top bit is the sign, the remaining bits the magnitude.
macro_rules! add_impl_for_ints {
    ($(($ty_src:ty, $ty_dst:ty),)*) => ($(
        impl GribInt<$ty_dst> for $ty_src {
            fn as_grib_int(&self) -> $ty_dst {
                if self.leading_zeros() == 0 {
                    let abs = (self << 1 >> 1) as $ty_dst;
                    -abs
                } else {
                    *self as $ty_dst
                }
            }
        }
    )*);
}

add_impl_for_ints! {
    (u8, i8),
    (u16, i16),
    (u32, i32),
    (u64, i64),
}

/// Sign-magnitude integer stored in the low `num_bits` bits of `value`.
pub(crate) fn sign_magnitude(value: u64, num_bits: u32) -> i64 {
    if num_bits == 0 {
        return 0;
    }
    let sign_bit = 1u64 << (num_bits - 1);
    let magnitude = (value & (sign_bit - 1)) as i64;
    if value & sign_bit != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// IBM System/360 single precision float used by GRIB edition 1.
///
/// Sign bit, 7-bit excess-64 base-16 exponent, 24-bit fraction:
/// `value = fraction * 2^-24 * 16^(exponent - 64)`. The range exceeds `f32`,
/// hence the `f64` result.
pub fn ibm_to_f64(bits: u32) -> f64 {
    let sign = if bits & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 24) & 0x7f) as i32;
    let mantissa = (bits & 0x00ff_ffff) as f64;
    if mantissa == 0.0 {
        return 0.0;
    }
    sign * mantissa * 2_f64.powi(-24) * 16_f64.powi(exponent - 64)
}

/// IEEE-754 single precision float used by GRIB edition 2.
pub fn ieee_to_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}
