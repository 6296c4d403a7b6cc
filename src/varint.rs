// Little-endian integer and unsigned LEB128 varint helpers for the
// container wire format. The varint shape follows `write_leb128`'s AV1
// LEB128 writer, generalized with matching readers since this codec parses
// its own container back (unlike a write-only AV1/ISOBMFF stream writer).

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{FpvError, Result};

/// Write a value in unsigned LEB128 format: 7 bits of value per byte,
/// high bit set while more bytes follow.
pub fn write_leb128<W: Write>(w: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            w.write_u8(byte | 0x80)?;
        } else {
            w.write_u8(byte)?;
            break;
        }
    }
    Ok(())
}

/// Number of bytes `write_leb128` would emit for `value`.
pub fn leb128_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read an unsigned LEB128 varint, returning `TruncatedPayload` if the
/// stream ends before a terminating byte (continuation bit clear) is seen.
pub fn read_leb128<R: Read>(r: &mut R) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(FpvError::CorruptHeader);
        }
        let byte = r.read_u8().map_err(|_| FpvError::TruncatedPayload)?;
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Parse a LEB128 varint from the front of a byte slice, returning the
/// decoded value and the number of bytes consumed.
pub fn parse_leb128(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(FpvError::CorruptHeader);
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(FpvError::TruncatedPayload)
}

pub fn read_u32_le(buf: &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(FpvError::TruncatedPayload);
    }
    Ok(LittleEndian::read_u32(buf))
}

pub fn read_u64_le(buf: &[u8]) -> Result<u64> {
    if buf.len() < 8 {
        return Err(FpvError::TruncatedPayload);
    }
    Ok(LittleEndian::read_u64(buf))
}

pub fn write_u32_le<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(value)
}

pub fn write_u64_le<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_u64::<LittleEndian>(value)
}
