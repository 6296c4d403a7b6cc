// C3: single-frame codec.
//
// Orchestrates C1 (predictor) + C2 (entropy) into one self-contained frame
// payload, optionally Brotli-wrapped. The record layout follows the same
// length-prefix-then-flags-byte idiom as `pack_obus`'s OBU framing; here
// there is only one record "type" (a compressed frame), so the flags byte
// carries just the Brotli toggle bit.

use std::io::{Read, Write};

use crate::entropy;
use crate::error::{FpvError, Result};
use crate::predictor;
use crate::varint;

/// Bit 0 of the record flags byte: payload is Brotli-wrapped.
const FLAG_BROTLI: u8 = 0x01;

/// Brotli quality used when attempting to shrink a frame payload. Fixed
/// rather than exposed as a tunable: correctness only requires that the
/// toggle bit match whether wrapping strictly reduced the payload's
/// length, not that compression level be configurable.
const BROTLI_QUALITY: i32 = 9;
const BROTLI_LG_WINDOW: i32 = 22;

/// Encode one frame against delta frame `d`, producing a complete record
/// (length-prefixed, flags byte, optionally-Brotli payload) ready to be
/// appended to the container stream.
pub fn encode_frame(x: &[u16], d: &[u16], shift: u8, big_endian: bool) -> Result<Vec<u8>> {
    let prep = predictor::preprocess(x, shift, big_endian)?;
    let (hi, lo) = predictor::plane_split(&prep, d)?;

    let enc_hi = entropy::encode_plane(&hi);
    let enc_lo = entropy::encode_plane(&lo);

    let mut payload = Vec::with_capacity(enc_hi.len() + enc_lo.len() + 10);
    varint::write_leb128(&mut payload, enc_hi.len() as u64)
        .map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    payload.extend_from_slice(&enc_hi);
    payload.extend_from_slice(&enc_lo);

    let (final_payload, flags) = maybe_brotli_wrap(&payload);

    let mut record = Vec::with_capacity(final_payload.len() + 10);
    varint::write_leb128(&mut record, (final_payload.len() + 1) as u64)
        .map_err(|e| FpvError::InvalidArgument(e.to_string()))?;
    record.push(flags);
    record.extend_from_slice(&final_payload);
    Ok(record)
}

/// Decode one frame record's body (everything after the length varint has
/// already been stripped by the caller) against delta frame `d`, given the
/// frame's pixel count.
pub fn decode_frame_body(body: &[u8], d: &[u16], shift: u8, big_endian: bool, pixel_count: usize) -> Result<Vec<u16>> {
    let &flags = body.first().ok_or(FpvError::TruncatedRecord)?;
    let payload = &body[1..];

    let raw_payload;
    let payload: &[u8] = if flags & FLAG_BROTLI != 0 {
        raw_payload = brotli_unwrap(payload)?;
        &raw_payload
    } else {
        payload
    };

    let (hi_len, consumed) = varint::parse_leb128(payload)?;
    let hi_len = hi_len as usize;
    let rest = &payload[consumed..];
    if rest.len() < hi_len {
        return Err(FpvError::TruncatedPayload);
    }
    let enc_hi = &rest[..hi_len];
    let enc_lo = &rest[hi_len..];

    let hi = entropy::decode_plane(enc_hi, pixel_count)?;
    let lo = entropy::decode_plane(enc_lo, pixel_count)?;

    let prep = predictor::plane_merge(&hi, &lo, d)?;
    predictor::postprocess(&prep, shift, big_endian)
}

fn maybe_brotli_wrap(payload: &[u8]) -> (Vec<u8>, u8) {
    let mut compressed = Vec::new();
    {
        let mut encoder = brotli::CompressorWriter::new(
            &mut compressed,
            4096,
            BROTLI_QUALITY as u32,
            BROTLI_LG_WINDOW as u32,
        );
        encoder
            .write_all(payload)
            .expect("in-memory brotli compression never fails");
    }

    if compressed.len() < payload.len() {
        log::debug!("brotli wrap shrank payload {} -> {} bytes", payload.len(), compressed.len());
        (compressed, FLAG_BROTLI)
    } else {
        log::debug!("brotli wrap did not shrink payload ({} bytes), emitting raw", payload.len());
        (payload.to_vec(), 0)
    }
}

fn brotli_unwrap(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut decoder = brotli::Decompressor::new(data, 4096);
    decoder
        .read_to_end(&mut out)
        .map_err(|_| FpvError::TruncatedPayload)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(record: &[u8]) -> Vec<u8> {
        let (len, consumed) = varint::parse_leb128(record).unwrap();
        record[consumed..consumed + len as usize].to_vec()
    }

    #[test]
    fn roundtrip_identical_frame_is_tiny() {
        let d = vec![0xABu16; 8];
        let x = d.clone();
        let record = encode_frame(&x, &d, 0, false).unwrap();
        let body = body_of(&record);
        let decoded = decode_frame_body(&body, &d, 0, false, x.len()).unwrap();
        assert_eq!(decoded, x);
    }

    #[test]
    fn roundtrip_counter_frames() {
        let d = vec![0u16; 4];
        for k in 0..8u16 {
            let x = vec![k; 4];
            let record = encode_frame(&x, &d, 0, false).unwrap();
            let body = body_of(&record);
            let decoded = decode_frame_body(&body, &d, 0, false, x.len()).unwrap();
            assert_eq!(decoded, x);
        }
    }

    #[test]
    fn roundtrip_shift8_8bit_source() {
        let d = vec![0u16; 4];
        let x: Vec<u16> = vec![10u16 << 8, 200u16 << 8, 0, 255u16 << 8];
        let record = encode_frame(&x, &d, 8, false).unwrap();
        let body = body_of(&record);
        let decoded = decode_frame_body(&body, &d, 8, false, x.len()).unwrap();
        assert_eq!(decoded, x);
    }

    #[test]
    fn roundtrip_1x1_frame() {
        let d = vec![0u16];
        let x = vec![42u16];
        let record = encode_frame(&x, &d, 0, false).unwrap();
        let body = body_of(&record);
        let decoded = decode_frame_body(&body, &d, 0, false, 1).unwrap();
        assert_eq!(decoded, x);
    }

    #[test]
    fn roundtrip_random_frame_with_brotli_toggle() {
        let mut state = 0x9E3779B97F4A7C15u64;
        let mut x = vec![0u16; 4096];
        for v in x.iter_mut() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            *v = (state & 0xFFFF) as u16;
        }
        let d = vec![0u16; x.len()];
        let record = encode_frame(&x, &d, 0, false).unwrap();
        let body = body_of(&record);
        let decoded = decode_frame_body(&body, &d, 0, false, x.len()).unwrap();
        assert_eq!(decoded, x);
    }
}
