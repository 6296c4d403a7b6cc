// Container wire format shared by C4 (writer), C5 (random-access reader) and
// C6 (streaming reader): header, per-frame records, trailing index block,
// footer. Modeled on the `ISOBMFFWriter`/`ISOBMFFBox` idiom in spirit
// (fixed magic, length-prefixed structure, a trailing index the reader
// seeks to) but flattened to this codec's much simpler little-endian
// layout rather than nested big-endian ISOBMFF boxes.

use std::io::Write;

use crate::error::{FpvError, Result};
use crate::varint;

/// Leading container magic.
pub const MAGIC_HEADER: &[u8; 4] = b"FPV1";
/// Trailing footer magic.
pub const MAGIC_FOOTER: &[u8; 4] = b"FPVI";
/// Current container version byte.
pub const VERSION: u8 = 1;

/// Fixed-size portion of the container header: magic(4) + version(1) +
/// W(4) + H(4) + S(1) + E(1).
pub const HEADER_LEN: usize = 4 + 1 + 4 + 4 + 1 + 1;

/// Fixed-size footer: index_offset(8) + frame_count(8) + magic(4).
pub const FOOTER_LEN: usize = 8 + 8 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub width: u32,
    pub height: u32,
    pub shift: u8,
    pub big_endian: bool,
}

impl ContainerHeader {
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC_HEADER)
            .and_then(|_| w.write_all(&[VERSION]))
            .and_then(|_| w.write_all(&self.width.to_le_bytes()))
            .and_then(|_| w.write_all(&self.height.to_le_bytes()))
            .and_then(|_| w.write_all(&[self.shift]))
            .and_then(|_| w.write_all(&[self.big_endian as u8]))
            .map_err(|e| FpvError::InvalidArgument(e.to_string()))
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(FpvError::TruncatedPayload);
        }
        if &buf[0..4] != MAGIC_HEADER {
            return Err(FpvError::CorruptHeader);
        }
        if buf[4] != VERSION {
            return Err(FpvError::CorruptHeader);
        }
        let width = varint::read_u32_le(&buf[5..9])?;
        let height = varint::read_u32_le(&buf[9..13])?;
        let shift = buf[13];
        let big_endian = buf[14] != 0;
        if shift > crate::predictor::MAX_SHIFT {
            return Err(FpvError::CorruptHeader);
        }
        Ok(ContainerHeader {
            width,
            height,
            shift,
            big_endian,
        })
    }
}

/// Trailing index block: frame_count varint followed by that many u64 LE
/// byte offsets (measured from the start of the container).
pub fn write_index_block<W: Write>(w: &mut W, offsets: &[u64]) -> Result<()> {
    varint::write_leb128(w, offsets.len() as u64)
        .map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    for &off in offsets {
        varint::write_u64_le(w, off).map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    }
    Ok(())
}

pub fn parse_index_block(buf: &[u8]) -> Result<Vec<u64>> {
    let (count, mut pos) = varint::parse_leb128(buf)?;
    let count = count as usize;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let end = pos
            .checked_add(8)
            .ok_or(FpvError::CorruptIndex)?;
        if end > buf.len() {
            return Err(FpvError::CorruptIndex);
        }
        offsets.push(varint::read_u64_le(&buf[pos..end])?);
        pos = end;
    }
    Ok(offsets)
}

/// Footer: index_offset(8 LE) | frame_count(8 LE) | magic(4), written after
/// the index block and located by seeking to the last [`FOOTER_LEN`] bytes
/// of the container.
pub fn write_footer<W: Write>(w: &mut W, index_offset: u64, frame_count: u64) -> Result<()> {
    varint::write_u64_le(w, index_offset).map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    varint::write_u64_le(w, frame_count).map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    w.write_all(MAGIC_FOOTER)
        .map_err(|e| FpvError::InvalidArgument(e.to_string()))
}

pub struct Footer {
    pub index_offset: u64,
    pub frame_count: u64,
}

pub fn parse_footer(buf: &[u8]) -> Result<Footer> {
    if buf.len() < FOOTER_LEN {
        return Err(FpvError::CorruptTrailer);
    }
    let tail = &buf[buf.len() - FOOTER_LEN..];
    let index_offset = varint::read_u64_le(&tail[0..8])?;
    let frame_count = varint::read_u64_le(&tail[8..16])?;
    if &tail[16..20] != MAGIC_FOOTER {
        return Err(FpvError::CorruptTrailer);
    }
    Ok(Footer {
        index_offset,
        frame_count,
    })
}

/// Split a length-prefixed frame record out of `buf` starting at `pos`,
/// returning the record's body slice (after the length varint) and the
/// index of the first byte past the record. Shared by the random-access
/// and streaming decoders so both agree on record boundaries.
pub fn parse_record_at(buf: &[u8], pos: usize) -> Result<(&[u8], usize)> {
    if pos >= buf.len() {
        return Err(FpvError::TruncatedRecord);
    }
    let (len, consumed) = varint::parse_leb128(&buf[pos..])?;
    let body_start = pos + consumed;
    let body_end = body_start
        .checked_add(len as usize)
        .ok_or(FpvError::CorruptIndex)?;
    if body_end > buf.len() {
        return Err(FpvError::TruncatedRecord);
    }
    Ok((&buf[body_start..body_end], body_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = ContainerHeader {
            width: 640,
            height: 480,
            shift: 8,
            big_endian: true,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        let parsed = ContainerHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(ContainerHeader::parse(&buf), Err(FpvError::CorruptHeader)));
    }

    #[test]
    fn index_block_roundtrip() {
        let offsets = vec![0u64, 100, 250, 9999];
        let mut buf = Vec::new();
        write_index_block(&mut buf, &offsets).unwrap();
        let parsed = parse_index_block(&buf).unwrap();
        assert_eq!(parsed, offsets);
    }

    #[test]
    fn footer_roundtrip() {
        let mut buf = Vec::new();
        write_footer(&mut buf, 12345, 7).unwrap();
        assert_eq!(buf.len(), FOOTER_LEN);
        let footer = parse_footer(&buf).unwrap();
        assert_eq!(footer.index_offset, 12345);
        assert_eq!(footer.frame_count, 7);
    }

    #[test]
    fn footer_rejects_short_buffer() {
        assert!(matches!(parse_footer(&[0u8; 4]), Err(FpvError::CorruptTrailer)));
    }

    #[test]
    fn record_split_respects_length_prefix() {
        let mut buf = Vec::new();
        varint::write_leb128(&mut buf, 3).unwrap();
        buf.extend_from_slice(&[1, 2, 3]);
        buf.extend_from_slice(&[0xAA, 0xBB]); // trailing unrelated bytes
        let (body, next) = parse_record_at(&buf, 0).unwrap();
        assert_eq!(body, &[1, 2, 3]);
        assert_eq!(next, buf.len() - 2);
    }

    #[test]
    fn record_split_rejects_truncation() {
        let mut buf = Vec::new();
        varint::write_leb128(&mut buf, 10).unwrap();
        buf.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(parse_record_at(&buf, 0), Err(FpvError::TruncatedRecord)));
    }
}
