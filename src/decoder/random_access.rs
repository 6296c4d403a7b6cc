// C5: random-access decoder. Parses the trailing index once at `new`, then
// decodes any frame by seeking straight to its byte offset.

use crate::container::{self, ContainerHeader, FOOTER_LEN};
use crate::error::{FpvError, Result};
use crate::frame_codec;
use crate::predictor;

pub struct RandomAccessDecoder<'a> {
    buf: &'a [u8],
    header: ContainerHeader,
    pixel_count: usize,
    offsets: Vec<u64>,
    zero_d: Vec<u16>,
    delta: Vec<u16>,
}

impl<'a> RandomAccessDecoder<'a> {
    /// Parse `buf` as a complete container: header, trailing footer, index
    /// block, and the delta frame at offset 0. Borrows `buf` for its
    /// lifetime; no copy of the encoded bytes is made.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let header = ContainerHeader::parse(buf)?;
        let pixel_count = predictor::validate_dimensions(header.width, header.height)?;

        if buf.len() < FOOTER_LEN {
            return Err(FpvError::CorruptTrailer);
        }
        let footer = container::parse_footer(buf)?;
        let index_offset = footer.index_offset as usize;
        let index_end = buf.len() - FOOTER_LEN;
        if index_offset > index_end {
            return Err(FpvError::CorruptIndex);
        }
        let offsets = container::parse_index_block(&buf[index_offset..index_end])?;
        if offsets.len() as u64 != footer.frame_count {
            return Err(FpvError::CorruptIndex);
        }
        if offsets.is_empty() {
            return Err(FpvError::CorruptIndex);
        }

        let zero_d = vec![0u16; pixel_count];
        let (body0, _) = container::parse_record_at(buf, offsets[0] as usize)?;
        let decoded0 = frame_codec::decode_frame_body(
            body0,
            &zero_d,
            header.shift,
            header.big_endian,
            pixel_count,
        )?;
        let delta = predictor::preprocess(&decoded0, header.shift, header.big_endian)?;

        log::debug!(
            "random-access decoder parsed {}x{} container, {} frame(s)",
            header.width,
            header.height,
            offsets.len()
        );

        Ok(RandomAccessDecoder {
            buf,
            header,
            pixel_count,
            offsets,
            zero_d,
            delta,
        })
    }

    /// Number of frames in the container, including the delta frame at
    /// index 0.
    pub fn num_frames(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    /// Decode frame `i` into `out`, which must hold exactly `W*H` pixels.
    pub fn decode_frame(&self, i: u64, out: &mut [u16]) -> Result<()> {
        let count = self.offsets.len() as u64;
        if i >= count {
            return Err(FpvError::OutOfBounds { index: i, count });
        }
        if out.len() != self.pixel_count {
            return Err(FpvError::InvalidArgument(
                "output buffer does not match W*H".to_string(),
            ));
        }

        let d_ref: &[u16] = if i == 0 { &self.zero_d } else { &self.delta };
        let (body, _) = container::parse_record_at(self.buf, self.offsets[i as usize] as usize)?;
        let decoded = frame_codec::decode_frame_body(
            body,
            d_ref,
            self.header.shift,
            self.header.big_endian,
            self.pixel_count,
        )?;
        out.copy_from_slice(&decoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::ParallelEncoder;

    fn encode(frames: &[Vec<u16>], width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        let mut enc = ParallelEncoder::new(1, 0, false);
        enc.init(&frames[0], width, height, &mut sink).unwrap();
        for frame in &frames[1..] {
            enc.compress_frame(frame, &mut sink).unwrap();
        }
        enc.finish(&mut sink).unwrap();
        out
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let bytes = encode(&[vec![1u16, 2, 3, 4]], 2, 2);
        let dec = RandomAccessDecoder::new(&bytes).unwrap();
        let mut out = vec![0u16; 4];
        let err = dec.decode_frame(5, &mut out).unwrap_err();
        assert!(matches!(err, FpvError::OutOfBounds { index: 5, count: 1 }));
    }

    #[test]
    fn truncated_container_is_rejected() {
        let bytes = encode(
            &[vec![1u16, 2, 3, 4], vec![5u16, 6, 7, 8], vec![0u16; 4]],
            2,
            2,
        );
        let truncated = &bytes[..bytes.len() - 20];
        assert!(RandomAccessDecoder::new(truncated).is_err());
    }

    #[test]
    fn dimensions_and_frame_count_reported() {
        let bytes = encode(&[vec![0u16; 6], vec![1u16; 6]], 3, 2);
        let dec = RandomAccessDecoder::new(&bytes).unwrap();
        assert_eq!(dec.dimensions(), (3, 2));
        assert_eq!(dec.num_frames(), 2);
    }
}
