// C2: entropy coder.
//
// An 8-context binary range coder: each byte plane gets one probability per
// bit position (0 = LSB ... 7 = MSB, per the glossary), computed once from
// the plane's own statistics and prepended to its coded bits. This is a
// classic carry-propagating byte-renormalizing range coder (the same family
// as the VP8/VP9 bool coder the corpus's `vpx_bool_reader.rs` implements
// the *decoder* half of); the probabilities here are static per plane
// rather than adaptive per bit, fixed up front from a single counting
// pass over the plane.

use crate::error::{FpvError, Result};

/// Fixed probability precision shared by encoder and decoder; the
/// precision itself is a crate constant, never stored per frame.
pub const PROB_BITS: u32 = 12;
pub const PROB_SCALE: u32 = 1 << PROB_BITS;
const PROB_TABLE_BYTES: usize = 8 * 2;

const TOP_VALUE: u32 = 1 << 24;

/// Count bit-1 frequency at each of the 8 bit positions across `plane`,
/// producing 8 probabilities quantized to `[1, PROB_SCALE - 1]`.
pub fn compute_probabilities(plane: &[u8]) -> [u16; 8] {
    let mut ones = [0u64; 8];
    for &byte in plane {
        for pos in 0..8 {
            if (byte >> pos) & 1 == 1 {
                ones[pos] += 1;
            }
        }
    }

    let n = plane.len() as u64;
    let mut probs = [0u16; 8];
    for pos in 0..8 {
        let p = if n == 0 {
            PROB_SCALE / 2
        } else {
            // Round to nearest, then clamp away from the degenerate ends:
            // an un-clamped probability of 0 or PROB_SCALE would make the
            // coder's range collapse to zero width.
            (((ones[pos] * PROB_SCALE as u64) + n / 2) / n) as u32
        };
        probs[pos] = p.clamp(1, PROB_SCALE - 1) as u16;
    }
    probs
}

fn write_prob_table<W: std::io::Write>(w: &mut W, probs: &[u16; 8]) -> std::io::Result<()> {
    for &p in probs {
        w.write_all(&p.to_le_bytes())?;
    }
    Ok(())
}

fn read_prob_table(buf: &[u8]) -> Result<[u16; 8]> {
    if buf.len() < PROB_TABLE_BYTES {
        return Err(FpvError::TruncatedPayload);
    }
    let mut probs = [0u16; 8];
    for (i, p) in probs.iter_mut().enumerate() {
        let v = u16::from_le_bytes([buf[i * 2], buf[i * 2 + 1]]);
        if v == 0 || v as u32 >= PROB_SCALE {
            return Err(FpvError::EntropyError);
        }
        *p = v;
    }
    Ok(probs)
}

/// Binary range encoder with LZMA-style carry propagation via a pending
/// byte + run-length cache.
struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoder {
    fn new() -> Self {
        // Matches the LZMA-SDK reference encoder's initial state: a
        // sentinel `cache` of 0xFF with `cache_size` 1 so the very first
        // byte `shift_low` emits is a throwaway that the decoder skips.
        RangeEncoder {
            low: 0,
            range: 0xFFFF_FFFF,
            cache: 0xFF,
            cache_size: 1,
            out: Vec::new(),
        }
    }

    fn shift_low(&mut self) {
        if (self.low >> 32) != 0 || self.low < 0xFF00_0000u64 {
            let carry = (self.low >> 32) as u8;
            let mut temp = self.cache;
            loop {
                self.out.push(temp.wrapping_add(carry));
                temp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    // `prob` is P(bit=1) (per compute_probabilities/§3-§4.2), so the
    // bound-sized sub-range — the classic LZMA-style formula's "small"
    // branch — belongs to bit=1 here, not bit=0.
    fn encode_bit(&mut self, prob: u16, bit: u8) {
        let bound = (self.range >> PROB_BITS) * prob as u32;
        if bit == 1 {
            self.range = bound;
        } else {
            self.low += bound as u64;
            self.range -= bound;
        }
        while self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.out
    }
}

/// Binary range decoder, the mirror of [`RangeEncoder`].
struct RangeDecoder<'a> {
    code: u32,
    range: u32,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RangeDecoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        let mut d = RangeDecoder {
            code: 0,
            range: 0xFFFF_FFFF,
            buf,
            pos: 0,
        };
        // Skip over the first output byte of the encoder, which is always
        // its placeholder cache byte (0, since `started` is false for the
        // very first shift), then prime `code` with 4 bytes.
        d.pos = 1;
        for _ in 0..4 {
            d.code = (d.code << 8) | d.next_byte() as u32;
        }
        d
    }

    fn next_byte(&mut self) -> u8 {
        let b = self.buf.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    // Mirrors `RangeEncoder::encode_bit`'s convention: `prob` is P(bit=1),
    // so the bound-sized sub-range decodes to bit=1.
    fn decode_bit(&mut self, prob: u16) -> Result<u8> {
        let bound = (self.range >> PROB_BITS) * prob as u32;
        let bit = if self.code < bound {
            self.range = bound;
            1
        } else {
            self.code -= bound;
            self.range -= bound;
            0
        };
        if self.range == 0 {
            return Err(FpvError::EntropyError);
        }
        while self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | self.next_byte() as u32;
        }
        Ok(bit)
    }
}

/// Encode one byte plane: probability table header followed by the
/// range-coded bitstream. Round-trips via [`decode_plane`] for any plane
/// length, including zero.
pub fn encode_plane(plane: &[u8]) -> Vec<u8> {
    let probs = compute_probabilities(plane);

    let mut out = Vec::with_capacity(PROB_TABLE_BYTES + plane.len());
    write_prob_table(&mut out, &probs).expect("writing to Vec never fails");

    // A zero-length plane gets a zero-length arithmetic tail: there are no
    // bits to code, and flushing the coder unconditionally would otherwise
    // emit a handful of meaningless bytes.
    if plane.is_empty() {
        return out;
    }

    let mut enc = RangeEncoder::new();
    for &byte in plane {
        for pos in (0..8).rev() {
            let bit = (byte >> pos) & 1;
            enc.encode_bit(probs[pos as usize], bit);
        }
    }
    out.extend_from_slice(&enc.finish());
    out
}

/// Decode one byte plane of `len` bytes from `data`, returning the decoded
/// plane and the number of bytes of `data` consumed.
///
/// `data` must be exactly this plane's encoded byte range (the caller is
/// responsible for framing successive planes with explicit lengths, per
/// `frame_codec`'s payload layout); this function does not infer where the
/// arithmetic stream ends.
pub fn decode_plane(data: &[u8], len: usize) -> Result<Vec<u8>> {
    let probs = read_prob_table(data)?;

    if len == 0 {
        return Ok(Vec::new());
    }

    let body = &data[PROB_TABLE_BYTES..];
    let mut dec = RangeDecoder::new(body);
    let mut plane = Vec::with_capacity(len);
    for _ in 0..len {
        let mut byte = 0u8;
        for pos in (0..8).rev() {
            let bit = dec.decode_bit(probs[pos as usize])?;
            byte |= bit << pos;
        }
        plane.push(byte);
    }

    Ok(plane)
}
