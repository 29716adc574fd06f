use std::io::{self, Read, Seek, SeekFrom};

use crate::grib::utils::{ibm_to_f64, ieee_to_f32, sign_magnitude, GribInt};

/// Partial byte left over by a non byte-aligned read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BitBuf {
    pub buffer: u8,
    pub bits_remaining: u8,
}

/// Bit addressable big-endian reader. Owns the stream position.
pub struct BitCursor<R> {
    reader: R,
    pos: u64,
    bits: BitBuf,
}

impl<R> BitCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pos: 0,
            bits: BitBuf::default(),
        }
    }

    /// Byte offset of the next whole byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Drops the partial byte, if any, so the next read starts on an octet.
    pub fn align(&mut self) {
        self.bits = BitBuf::default();
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> BitCursor<R> {
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.align();
        self.reader.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Fills as much of `buf` as the stream allows; returns the byte count.
    pub(crate) fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.align();
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read_exact(&mut buf[..])?;
        Ok(buf)
    }

    fn next_byte(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.reader.read_exact(&mut buf)?;
        self.pos += 1;
        Ok(buf[0])
    }

    /// Reads `num_bits` (at most 32) bits, most significant bit first.
    pub fn read_bits(&mut self, num_bits: u32) -> io::Result<u32> {
        if num_bits > 32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot read {} bits at once", num_bits),
            ));
        }

        let mut wanted = num_bits;
        let mut value: u64 = 0;
        while wanted > 0 {
            if self.bits.bits_remaining == 0 {
                self.bits = BitBuf {
                    buffer: self.next_byte()?,
                    bits_remaining: 8,
                };
            }

            let take = wanted.min(self.bits.bits_remaining as u32);
            let shift = self.bits.bits_remaining as u32 - take;
            let chunk = (self.bits.buffer as u32 >> shift) & ((1u32 << take) - 1);

            value = (value << take) | chunk as u64;
            self.bits.bits_remaining -= take as u8;
            wanted -= take;
        }

        Ok(value as u32)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.align();
        self.next_byte()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_u24(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf[1..])?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        Ok(self.read_u8()?.as_grib_int())
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        Ok(self.read_u16()?.as_grib_int())
    }

    pub fn read_i24(&mut self) -> io::Result<i32> {
        Ok(sign_magnitude(self.read_u24()? as u64, 24) as i32)
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        Ok(self.read_u32()?.as_grib_int())
    }

    /// Sign-magnitude integer of `num_octets` octets (1 to 8).
    pub fn read_int_octets(&mut self, num_octets: usize) -> io::Result<i64> {
        if num_octets == 0 || num_octets > 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot read a {} octet integer", num_octets),
            ));
        }
        let mut buf = [0; 8];
        self.read_exact(&mut buf[8 - num_octets..])?;
        Ok(sign_magnitude(u64::from_be_bytes(buf), 8 * num_octets as u32))
    }

    /// Signed 32-bit field; all `0xFF` octets mean "undefined".
    pub fn read_i32_opt(&mut self) -> io::Result<Option<i32>> {
        let raw = self.read_u32()?;
        if raw == u32::MAX {
            Ok(None)
        } else {
            Ok(Some(raw.as_grib_int()))
        }
    }

    /// Unsigned 32-bit field; all `0xFF` octets mean "undefined".
    pub fn read_u32_opt(&mut self) -> io::Result<Option<u32>> {
        let raw = self.read_u32()?;
        Ok(if raw == u32::MAX { None } else { Some(raw) })
    }

    pub fn read_ieee_f32(&mut self) -> io::Result<f32> {
        Ok(ieee_to_f32(self.read_u32()?))
    }

    pub fn read_ieee_f64(&mut self) -> io::Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_ibm_f32(&mut self) -> io::Result<f64> {
        Ok(ibm_to_f64(self.read_u32()?))
    }
}

impl<R: Read + Seek> BitCursor<R> {
    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.align();
        self.pos = self.reader.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn skip(&mut self, num_bytes: u64) -> io::Result<()> {
        if num_bytes > 0 {
            self.seek(self.pos + num_bytes)?;
        } else {
            self.align();
        }
        Ok(())
    }
}
