// External collaborator: camera sequence reader, explicitly out of scope
// for the codec itself — this format is input material a driver reads and
// hands to `compress_frame`, not the codec's own container.
//
// Sequential-reader shape borrowed from `Y4MReader` (a struct wrapping a
// generic `R: Read`, parsing a fixed header once in `new` then handing
// back one frame per call), but the wire format here is fixed-width
// little-endian binary rather than Y4M's text header, so there is no token
// scanning — just `byteorder` reads, returning `Result` instead of
// panicking on a malformed file.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::error::{FpvError, Result};

pub struct CameraSequenceReader<R> {
    inner: R,
    width: u32,
    height: u32,
    bit_depth: u16,
    kept_frame_count: u32,
    frames_read: u32,
}

impl<R: Read> CameraSequenceReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let width = inner
            .read_u32::<LittleEndian>()
            .map_err(|_| FpvError::TruncatedPayload)?;
        let height = inner
            .read_u32::<LittleEndian>()
            .map_err(|_| FpvError::TruncatedPayload)?;
        let bit_depth = inner
            .read_u16::<LittleEndian>()
            .map_err(|_| FpvError::TruncatedPayload)?;
        let kept_frame_count = inner
            .read_u32::<LittleEndian>()
            .map_err(|_| FpvError::TruncatedPayload)?;

        if width == 0 || height == 0 {
            return Err(FpvError::InvalidArgument(
                "camera sequence has zero width or height".to_string(),
            ));
        }

        Ok(CameraSequenceReader {
            inner,
            width,
            height,
            bit_depth,
            kept_frame_count,
            frames_read: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    pub fn kept_frame_count(&self) -> u32 {
        self.kept_frame_count
    }

    /// Read the next `(timestamp, pixels)` record, widening each 8-bit
    /// sample into the **high** byte of a `u16` (`sample << 8`), matching
    /// the spec's canonical convention for 8-bit source data: a codec-layer
    /// shift of 8 then right-shifts it back down to occupy the low byte
    /// before delta-coding. Returns `Ok(None)` once `kept_frame_count`
    /// records have been read.
    pub fn read_frame(&mut self) -> Result<Option<(i64, Vec<u16>)>> {
        if self.frames_read >= self.kept_frame_count {
            return Ok(None);
        }

        let timestamp = self
            .inner
            .read_i64::<LittleEndian>()
            .map_err(|_| FpvError::TruncatedPayload)?;

        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut raw = vec![0u8; pixel_count];
        self.inner
            .read_exact(&mut raw)
            .map_err(|_| FpvError::TruncatedPayload)?;

        let pixels = raw.into_iter().map(|b| (b as u16) << 8).collect();
        self.frames_read += 1;
        Ok(Some((timestamp, pixels)))
    }
}
