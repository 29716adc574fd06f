#![allow(dead_code)]

//! Builders for synthetic GRIB messages, octet by octet.

/// First grid point of the polar stereographic test message.
pub const POLAR_FIRST_POINT: (f64, f64) = (40.000001, 349.999999);

/// MSB first bit packer.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    pub fn push(&mut self, value: u32, num_bits: u32) -> &mut Self {
        for bit in (0..num_bits).rev() {
            if self.used == 0 {
                self.bytes.push(0);
            }
            if (value >> bit) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> self.used;
            }
            self.used = (self.used + 1) % 8;
        }
        self
    }

    pub fn push_all(&mut self, values: &[u32], num_bits: u32) -> &mut Self {
        for value in values {
            self.push(*value, num_bits);
        }
        self
    }

    pub fn align(&mut self) -> &mut Self {
        self.used = 0;
        self
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.align();
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.used = 0;
        std::mem::take(&mut self.bytes)
    }
}

pub fn pack(values: &[u32], num_bits: u32) -> Vec<u8> {
    BitWriter::default().push_all(values, num_bits).finish()
}

fn sign_magnitude(value: i64, octets: usize) -> Vec<u8> {
    let mut raw = value.unsigned_abs().to_be_bytes()[8 - octets..].to_vec();
    if value < 0 {
        raw[0] |= 0x80;
    }
    raw
}

pub fn i16_sm(value: i64) -> Vec<u8> {
    sign_magnitude(value, 2)
}

pub fn i24_sm(value: i64) -> Vec<u8> {
    sign_magnitude(value, 3)
}

pub fn i32_sm(value: i64) -> Vec<u8> {
    sign_magnitude(value, 4)
}

// Edition 2

pub fn section(number: u8, body: &[u8]) -> Vec<u8> {
    let mut section = ((body.len() + 5) as u32).to_be_bytes().to_vec();
    section.push(number);
    section.extend_from_slice(body);
    section
}

pub fn grib2(discipline: u8, sections: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;
    let mut message = b"GRIB".to_vec();
    message.extend([0, 0, discipline, 2]);
    message.extend((total as u64).to_be_bytes());
    for section in sections {
        message.extend_from_slice(section);
    }
    message.extend_from_slice(b"7777");
    message
}

pub fn identification() -> Vec<u8> {
    let mut body = 7u16.to_be_bytes().to_vec();
    body.extend(0u16.to_be_bytes());
    body.extend([2, 1, 1]);
    body.extend(2021u16.to_be_bytes());
    body.extend([10, 21, 12, 0, 0, 0, 1]);
    section(1, &body)
}

fn grid_header(num_points: u32, template: u16) -> Vec<u8> {
    let mut body = vec![0];
    body.extend(num_points.to_be_bytes());
    body.extend([0, 0]);
    body.extend(template.to_be_bytes());
    // spherical earth of radius 6,371,229 m
    body.push(6);
    body.extend([0xff; 15]);
    body
}

/// Template 3.20, 5x5 points 100 km apart, north pole, j scanning northward.
pub fn polar_grid() -> Vec<u8> {
    let mut body = grid_header(25, 20);
    body.extend(5u32.to_be_bytes());
    body.extend(5u32.to_be_bytes());
    body.extend(i32_sm(40_000_001));
    body.extend(i32_sm(349_999_999));
    body.push(0);
    body.extend(i32_sm(60_000_000));
    body.extend(i32_sm(265_000_000));
    body.extend(100_000_000u32.to_be_bytes());
    body.extend(100_000_000u32.to_be_bytes());
    body.push(0);
    body.push(0x40);
    section(3, &body)
}

/// Template 3.0 with angles in micro-degrees.
pub fn latlon_grid(ni: u32, nj: u32, first: (i64, i64), last: (i64, i64), scanning_mode: u8) -> Vec<u8> {
    section(3, &latlon_body(0, ni, nj, first, last, scanning_mode))
}

/// Template 3.1, the south pole of rotation in micro-degrees.
pub fn rotated_grid(ni: u32, nj: u32, first: (i64, i64), last: (i64, i64), south_pole: (i64, i64)) -> Vec<u8> {
    let mut body = latlon_body(1, ni, nj, first, last, 0);
    body.extend(i32_sm(south_pole.0));
    body.extend(i32_sm(south_pole.1));
    body.extend(0f32.to_be_bytes());
    section(3, &body)
}

fn latlon_body(template: u16, ni: u32, nj: u32, first: (i64, i64), last: (i64, i64), scanning_mode: u8) -> Vec<u8> {
    let mut body = grid_header(ni * nj, template);
    body.extend(ni.to_be_bytes());
    body.extend(nj.to_be_bytes());
    body.extend(0u32.to_be_bytes());
    body.extend(u32::MAX.to_be_bytes());
    body.extend(i32_sm(first.0));
    body.extend(i32_sm(first.1));
    body.push(0x30);
    body.extend(i32_sm(last.0));
    body.extend(i32_sm(last.1));
    body.extend(1_000_000u32.to_be_bytes());
    body.extend(1_000_000u32.to_be_bytes());
    body.push(scanning_mode);
    body
}

/// Template 4.0, 6 hour forecast at 2 m above ground.
pub fn product(category: u8, number: u8) -> Vec<u8> {
    let mut body = vec![0, 0, 0, 0, category, number, 2, 0, 96, 0, 0, 0, 1];
    body.extend(6u32.to_be_bytes());
    body.extend([103, 0, 0, 0, 0, 2]);
    body.extend([255; 6]);
    section(4, &body)
}

fn representation_header(num_values: u32, template: u16, r: f32, e: i64, d: i64, bits: u8) -> Vec<u8> {
    let mut body = num_values.to_be_bytes().to_vec();
    body.extend(template.to_be_bytes());
    body.extend(r.to_be_bytes());
    body.extend(i16_sm(e));
    body.extend(i16_sm(d));
    body.extend([bits, 0]);
    body
}

pub fn simple_representation(num_values: u32, r: f32, e: i64, d: i64, bits: u8) -> Vec<u8> {
    section(5, &representation_header(num_values, 0, r, e, d, bits))
}

pub struct Groups {
    pub num_groups: u32,
    pub widths_num_bits: u8,
    pub lengths_reference: u32,
    pub lengths_num_bits: u8,
    pub last_length: u32,
}

/// Template 5.3 over integers (R = 0, E = 0, D = 0).
pub fn spatial_diff_representation(
    num_values: u32,
    bits: u8,
    missing_management: u8,
    groups: &Groups,
    order: u8,
    descriptor_octets: u8,
) -> Vec<u8> {
    let mut body = representation_header(num_values, 3, 0.0, 0, 0, bits);
    body.extend([1, missing_management]);
    body.extend(u32::MAX.to_be_bytes());
    body.extend(u32::MAX.to_be_bytes());
    body.extend(groups.num_groups.to_be_bytes());
    body.extend([0, groups.widths_num_bits]);
    body.extend(groups.lengths_reference.to_be_bytes());
    body.push(1);
    body.extend(groups.last_length.to_be_bytes());
    body.push(groups.lengths_num_bits);
    body.extend([order, descriptor_octets]);
    section(5, &body)
}

pub fn bitmap(present: &[bool]) -> Vec<u8> {
    let bits: Vec<u32> = present.iter().map(|&p| p as u32).collect();
    let mut body = vec![0];
    body.extend(pack(&bits, 1));
    section(6, &body)
}

pub fn bitmap_indicator(indicator: u8) -> Vec<u8> {
    section(6, &[indicator])
}

pub fn data(payload: &[u8]) -> Vec<u8> {
    section(7, payload)
}

/// Packed codes of the polar message: value k is `5340 + k`.
pub fn polar_codes() -> Vec<u32> {
    (0..25).map(|k| 10 * k).collect()
}

/// 207 octets: 5x5 polar stereographic grid, simple packing on 11 bits of
/// R = 53400, E = 0, D = 1, no bitmap.
pub fn polar_message() -> Vec<u8> {
    grib2(
        0,
        &[
            identification(),
            polar_grid(),
            product(0, 0),
            simple_representation(25, 53400.0, 0, 1, 11),
            bitmap_indicator(255),
            data(&pack(&polar_codes(), 11)),
        ],
    )
}

// Edition 1

pub fn grib1_section(body: &[u8]) -> Vec<u8> {
    let mut section = ((body.len() + 3) as u32).to_be_bytes()[1..].to_vec();
    section.extend_from_slice(body);
    section
}

pub fn grib1(sections: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = 8 + sections.iter().map(Vec::len).sum::<usize>() + 4;
    let mut message = b"GRIB".to_vec();
    message.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
    message.push(1);
    for section in sections {
        message.extend_from_slice(section);
    }
    message.extend_from_slice(b"7777");
    message
}

/// Product definition for 2 m temperature, 2021-10-21 12:00 + 6 h.
pub fn pds(centre: u8, flags: u8, decimal_scale: i64) -> Vec<u8> {
    let mut body = vec![128, centre, 145, 255, flags, 167, 1, 0, 0];
    body.extend([21, 10, 21, 12, 0, 1, 6, 0, 0, 0, 0, 0, 21, 0]);
    body.extend(i16_sm(decimal_scale));
    grib1_section(&body)
}

/// Regular lat/lon grid description, angles in millidegrees.
pub fn gds_latlon(ni: u16, nj: u16, first: (i64, i64), last: (i64, i64), scanning_mode: u8) -> Vec<u8> {
    let mut body = vec![0, 255, 0];
    body.extend(ni.to_be_bytes());
    body.extend(nj.to_be_bytes());
    body.extend(i24_sm(first.0));
    body.extend(i24_sm(first.1));
    body.push(0x80);
    body.extend(i24_sm(last.0));
    body.extend(i24_sm(last.1));
    body.extend(1000u16.to_be_bytes());
    body.extend(1000u16.to_be_bytes());
    body.push(scanning_mode);
    body.extend([0; 4]);
    grib1_section(&body)
}

/// Bit map section; `extra_length` is added to the declared length only.
pub fn bms(present: &[bool], extra_length: u32) -> Vec<u8> {
    let bits: Vec<u32> = present.iter().map(|&p| p as u32).collect();
    let packed = pack(&bits, 1);
    let unused = (packed.len() * 8 - present.len()) as u8;
    let mut section = grib1_section(&[&[unused, 0, 0][..], &packed[..]].concat());
    let declared = section.len() as u32 + extra_length;
    section[..3].copy_from_slice(&declared.to_be_bytes()[1..]);
    section
}

/// Binary data section, grid point simple packing; `r` is IBM encoded.
pub fn bds(ibm_r: u32, e: i64, bits: u8, codes: &[u32]) -> Vec<u8> {
    let packed = pack(codes, bits as u32);
    let unused = (packed.len() * 8 - codes.len() * bits as usize) as u8;
    let mut body = vec![unused];
    body.extend(i16_sm(e));
    body.extend(ibm_r.to_be_bytes());
    body.push(bits);
    body.extend(packed);
    grib1_section(&body)
}

/// IBM single precision 1.0
pub const IBM_ONE: u32 = 0x4110_0000;
