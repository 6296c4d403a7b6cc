// C1: bit-plane predictor.
//
// Free functions over flat, row-major pixel buffers, in the style of the
// teacher's `recon.rs` (prediction/residual helpers are plain functions
// taking slices, not methods on a heavyweight struct) rather than
// `tinyavif`'s block-oriented `Array2D`-based transforms: these operations
// are uniform across every pixel, so there's no block/row structure to
// carry.

use crate::error::{FpvError, Result};

/// Maximum legal shift amount (shift S is an integer in 0..=8).
pub const MAX_SHIFT: u8 = 8;

/// Validate that `shift` is in the legal range and that `width`/`height`
/// multiply without overflow, returning the pixel count.
pub fn validate_dimensions(width: u32, height: u32) -> Result<usize> {
    let count = (width as u64).checked_mul(height as u64).ok_or_else(|| {
        FpvError::InvalidArgument("width * height overflows".to_string())
    })?;
    if count > usize::MAX as u64 {
        return Err(FpvError::InvalidArgument("frame too large for this platform".to_string()));
    }
    Ok(count as usize)
}

fn check_shift(shift: u8) -> Result<()> {
    if shift > MAX_SHIFT {
        return Err(FpvError::InvalidArgument(format!("shift {shift} exceeds maximum {MAX_SHIFT}")));
    }
    Ok(())
}

/// Apply optional byteswap then right-shift by `shift`, masked to 16 bits.
/// Output pixels occupy the low `(16 - shift)` bits.
pub fn preprocess(frame_in: &[u16], shift: u8, big_endian: bool) -> Result<Vec<u16>> {
    check_shift(shift)?;
    Ok(frame_in
        .iter()
        .map(|&p| {
            let p = if big_endian { p.swap_bytes() } else { p };
            p >> shift
        })
        .collect())
}

/// Inverse of [`preprocess`]: scale back up by `shift` bits then
/// conditionally byte-swap back to wire order.
pub fn postprocess(frame_prep: &[u16], shift: u8, big_endian: bool) -> Result<Vec<u16>> {
    check_shift(shift)?;
    Ok(frame_prep
        .iter()
        .map(|&p| {
            let scaled = p.wrapping_shl(shift as u32);
            if big_endian { scaled.swap_bytes() } else { scaled }
        })
        .collect())
}

/// Compute `R = X xor D` and split into high/low byte planes.
///
/// `x` and `d` must have the same length (caller-enforced: both are
/// preprocessed frames of the stream's fixed `W*H`).
pub fn plane_split(x: &[u16], d: &[u16]) -> Result<(Vec<u8>, Vec<u8>)> {
    if x.len() != d.len() {
        return Err(FpvError::InvalidArgument(
            "frame and delta frame length mismatch".to_string(),
        ));
    }
    let mut hi = Vec::with_capacity(x.len());
    let mut lo = Vec::with_capacity(x.len());
    for (&xv, &dv) in x.iter().zip(d.iter()) {
        let r = xv ^ dv;
        hi.push((r >> 8) as u8);
        lo.push((r & 0xFF) as u8);
    }
    Ok((hi, lo))
}

/// Inverse of [`plane_split`]: recombine `hi`/`lo` byte planes into 16-bit
/// words and XOR with the delta frame to recover the preprocessed pixels.
pub fn plane_merge(hi: &[u8], lo: &[u8], d: &[u16]) -> Result<Vec<u16>> {
    if hi.len() != lo.len() || hi.len() != d.len() {
        return Err(FpvError::InvalidArgument(
            "plane/delta frame length mismatch".to_string(),
        ));
    }
    Ok(hi
        .iter()
        .zip(lo.iter())
        .zip(d.iter())
        .map(|((&h, &l), &dv)| {
            let r = ((h as u16) << 8) | (l as u16);
            r ^ dv
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_postprocess_roundtrip_shift0() {
        let frame = vec![0u16, 1, 1000, 65535, 32768];
        let prep = preprocess(&frame, 0, false).unwrap();
        assert_eq!(prep, frame);
        let post = postprocess(&prep, 0, false).unwrap();
        assert_eq!(post, frame);
    }

    #[test]
    fn preprocess_shift8_keeps_high_byte_source() {
        // 8-bit source data placed in the high byte (S=8, E=0).
        let frame: Vec<u16> = (0..256u16).map(|v| v << 8).collect();
        let prep = preprocess(&frame, 8, false).unwrap();
        let expected: Vec<u16> = (0..256u16).collect();
        assert_eq!(prep, expected);

        let post = postprocess(&prep, 8, false).unwrap();
        assert_eq!(post, frame);
    }

    #[test]
    fn preprocess_with_byteswap_roundtrips() {
        let frame = vec![0x1234u16, 0xABCDu16, 0u16];
        let prep = preprocess(&frame, 0, true).unwrap();
        assert_eq!(prep, vec![0x3412u16, 0xCDABu16, 0u16]);
        let post = postprocess(&prep, 0, true).unwrap();
        assert_eq!(post, frame);
    }

    #[test]
    fn plane_split_merge_roundtrip() {
        let d = vec![0u16, 100, 65535];
        let x = vec![5u16, 100, 0];
        let (hi, lo) = plane_split(&x, &d).unwrap();
        let merged = plane_merge(&hi, &lo, &d).unwrap();
        assert_eq!(merged, x);
    }

    #[test]
    fn plane_split_of_identical_frames_is_zero() {
        let d = vec![42u16, 7, 9999];
        let (hi, lo) = plane_split(&d, &d).unwrap();
        assert!(hi.iter().all(|&b| b == 0));
        assert!(lo.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_shift_over_max() {
        assert!(preprocess(&[1, 2, 3], 9, false).is_err());
    }

    #[test]
    fn empty_frame_is_valid() {
        let (hi, lo) = plane_split(&[], &[]).unwrap();
        assert!(hi.is_empty() && lo.is_empty());
    }

    #[test]
    fn validate_dimensions_computes_pixel_count() {
        assert_eq!(validate_dimensions(4, 2).unwrap(), 8);
        assert_eq!(validate_dimensions(1, 1).unwrap(), 1);
    }
}
