// C6: streaming decoder. A pull-parser state machine driven by `feed`
// calls carrying arbitrarily sliced byte runs, through four states:
// header, frame-length, frame-body, and a terminal error state.

use crate::container::{self, ContainerHeader, FOOTER_LEN};
use crate::error::FpvError;
use crate::frame_codec;
use crate::predictor;
use crate::varint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    HeaderPending,
    FrameLenPending,
    FrameBodyPending,
    TerminalError,
}

/// Result of re-reading a would-be frame record's bytes as the trailing
/// index block + footer instead, per [`StreamingDecoder::probe_trailer`].
enum TrailerProbe {
    /// The bytes from the current record's start to the end of the
    /// buffer are exactly a well-formed index block + footer.
    Complete,
    /// Too few bytes are buffered yet to tell; the same bytes parsed as
    /// a frame record also failed, but more data could still resolve
    /// this into a valid trailer.
    NeedMoreBytes,
    /// Neither a valid frame record nor a valid trailer.
    Invalid,
}

/// Invoked once per decoded frame (`Some(pixels)`) or once on the first
/// unrecoverable failure (`None`). The pixel slice is owned by the decoder
/// for the duration of the call; callers needing to keep it must copy.
pub type FrameCallback<'cb> = dyn FnMut(Option<&[u16]>, u32, u32) + 'cb;

/// The container format has no explicit "end of stream" marker within
/// `feed` itself, which only ever accumulates more buffered bytes; `finish`
/// is this decoder's addition so a caller can signal end-of-input and let
/// the trailer-tolerance rule actually resolve.
pub struct StreamingDecoder {
    buf: Vec<u8>,
    state: State,
    header: Option<ContainerHeader>,
    pixel_count: usize,
    zero_d: Vec<u16>,
    delta: Option<Vec<u16>>,
    seen_first_frame: bool,
    pending_prefix_len: usize,
    pending_body_len: usize,
}

impl StreamingDecoder {
    pub fn new() -> Self {
        StreamingDecoder {
            buf: Vec::new(),
            state: State::HeaderPending,
            header: None,
            pixel_count: 0,
            zero_d: Vec::new(),
            delta: None,
            seen_first_frame: false,
            pending_prefix_len: 0,
            pending_body_len: 0,
        }
    }

    fn dims(&self) -> (u32, u32) {
        self.header.map(|h| (h.width, h.height)).unwrap_or((0, 0))
    }

    fn fail(&mut self, callback: &mut FrameCallback<'_>) {
        if self.state == State::TerminalError {
            return;
        }
        log::warn!("streaming decoder entered terminal error in state {:?}", self.state);
        let (w, h) = self.dims();
        callback(None, w, h);
        self.state = State::TerminalError;
    }

    /// Feed the next chunk of bytes, however sliced; any slicing of the
    /// same underlying byte stream yields the same sequence of callback
    /// invocations.
    pub fn feed(&mut self, bytes: &[u8], callback: &mut FrameCallback<'_>) {
        if self.state == State::TerminalError {
            return;
        }
        self.buf.extend_from_slice(bytes);
        self.pump(callback);
    }

    /// Signal that no further bytes will arrive. Resolves trailing
    /// index/footer bytes against the trailer-tolerance rule, or reports a
    /// failure if the stream ended mid-structure.
    pub fn finish(&mut self, callback: &mut FrameCallback<'_>) {
        if self.state == State::TerminalError {
            return;
        }
        if self.state != State::FrameLenPending {
            // Mid-header or mid-frame-body with no more bytes coming: the
            // stream ended before a structurally complete point.
            self.fail(callback);
            return;
        }
        if self.buf.is_empty() {
            return;
        }
        if self.buf.len() < FOOTER_LEN {
            self.fail(callback);
            return;
        }
        let Ok(footer) = container::parse_footer(&self.buf) else {
            self.fail(callback);
            return;
        };
        let index_end = self.buf.len() - FOOTER_LEN;
        let index_start = match usize::try_from(footer.index_offset) {
            Ok(v) if v <= index_end => v,
            _ => {
                self.fail(callback);
                return;
            }
        };
        match container::parse_index_block(&self.buf[index_start..index_end]) {
            Ok(offsets) if offsets.len() as u64 == footer.frame_count => {
                // Trailer is well-formed; tolerate it silently.
            }
            _ => self.fail(callback),
        }
    }

    fn pump(&mut self, callback: &mut FrameCallback<'_>) {
        loop {
            match self.state {
                State::TerminalError => return,
                State::HeaderPending => {
                    if self.buf.len() < container::HEADER_LEN {
                        return;
                    }
                    match ContainerHeader::parse(&self.buf[..container::HEADER_LEN]) {
                        Ok(header) => match predictor::validate_dimensions(header.width, header.height) {
                            Ok(pixel_count) => {
                                log::debug!(
                                    "streaming decoder parsed header: {}x{} ({} px), shift={}, big_endian={}",
                                    header.width, header.height, pixel_count, header.shift, header.big_endian
                                );
                                self.header = Some(header);
                                self.pixel_count = pixel_count;
                                self.zero_d = vec![0u16; pixel_count];
                                self.buf.drain(..container::HEADER_LEN);
                                self.state = State::FrameLenPending;
                            }
                            Err(_) => {
                                self.fail(callback);
                                return;
                            }
                        },
                        Err(_) => {
                            self.fail(callback);
                            return;
                        }
                    }
                }
                State::FrameLenPending => {
                    match varint::parse_leb128(&self.buf) {
                        Ok((len, consumed)) => {
                            self.pending_prefix_len = consumed;
                            self.pending_body_len = len as usize;
                            self.state = State::FrameBodyPending;
                        }
                        Err(FpvError::TruncatedPayload) => return,
                        Err(_) => {
                            self.fail(callback);
                            return;
                        }
                    }
                }
                State::FrameBodyPending => {
                    let total = self.pending_prefix_len + self.pending_body_len;
                    if self.buf.len() < total {
                        return;
                    }
                    let body = &self.buf[self.pending_prefix_len..total];
                    let d_ref: &[u16] = if self.seen_first_frame {
                        self.delta.as_ref().expect("delta set once first frame decodes")
                    } else {
                        &self.zero_d
                    };
                    let header = self.header.expect("header parsed before any frame body");
                    match frame_codec::decode_frame_body(
                        body,
                        d_ref,
                        header.shift,
                        header.big_endian,
                        self.pixel_count,
                    ) {
                        Ok(pixels) => {
                            if !self.seen_first_frame {
                                match predictor::preprocess(&pixels, header.shift, header.big_endian) {
                                    Ok(d) => self.delta = Some(d),
                                    Err(_) => {
                                        self.fail(callback);
                                        return;
                                    }
                                }
                                self.seen_first_frame = true;
                            }
                            callback(Some(&pixels), header.width, header.height);
                            self.buf.drain(..total);
                            self.state = State::FrameLenPending;
                        }
                        Err(_) => {
                            // The container format has no inline marker
                            // distinguishing the last real frame from the
                            // trailing index block + footer, so a record
                            // that fails to decode as a frame gets one more
                            // chance to resolve as that trailer before
                            // this is treated as genuine corruption.
                            match self.probe_trailer() {
                                TrailerProbe::Complete => {
                                    log::debug!("streaming decoder resolved trailing bytes as the index/footer trailer");
                                    self.buf.clear();
                                    self.state = State::FrameLenPending;
                                    return;
                                }
                                TrailerProbe::NeedMoreBytes => {
                                    self.state = State::FrameLenPending;
                                    return;
                                }
                                TrailerProbe::Invalid => {
                                    self.fail(callback);
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Re-read the bytes of the record currently pending decode — from its
    /// length-prefix varint to wherever the buffer currently ends — as an
    /// index block (`frame_count` varint + that many `u64` offsets)
    /// immediately followed by the fixed-size footer, per §3/§4.6's
    /// trailer-tolerance rule.
    fn probe_trailer(&self) -> TrailerProbe {
        let (count, consumed) = match varint::parse_leb128(&self.buf) {
            Ok(v) => v,
            Err(_) => return TrailerProbe::Invalid,
        };
        let index_len = match (count as usize)
            .checked_mul(8)
            .and_then(|offsets_len| offsets_len.checked_add(consumed))
        {
            Some(v) => v,
            None => return TrailerProbe::Invalid,
        };
        let total = match index_len.checked_add(FOOTER_LEN) {
            Some(v) => v,
            None => return TrailerProbe::Invalid,
        };
        if self.buf.len() < total {
            return TrailerProbe::NeedMoreBytes;
        }
        if self.buf.len() > total {
            return TrailerProbe::Invalid;
        }
        match container::parse_footer(&self.buf) {
            Ok(footer) if footer.frame_count == count => TrailerProbe::Complete,
            _ => TrailerProbe::Invalid,
        }
    }
}

impl Default for StreamingDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::random_access::RandomAccessDecoder;
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
    fn streaming_fed_whole_matches_random_access() {
        let frames: Vec<Vec<u16>> = (0..8u16).map(|k| vec![k; 4]).collect();
        let bytes = encode(&frames, 2, 2);

        let mut received: Vec<Vec<u16>> = Vec::new();
        let mut failures = 0usize;
        let mut dec = StreamingDecoder::new();
        {
            let mut cb = |pixels: Option<&[u16]>, _w: u32, _h: u32| match pixels {
                Some(p) => received.push(p.to_vec()),
                None => failures += 1,
            };
            dec.feed(&bytes, &mut cb);
            dec.finish(&mut cb);
        }

        assert_eq!(failures, 0);
        assert_eq!(received.len(), frames.len());
        assert_eq!(received, frames);
    }

    #[test]
    fn streaming_fed_byte_at_a_time_matches_random_access() {
        let frames: Vec<Vec<u16>> = (0..50u16).map(|k| vec![k, k.wrapping_mul(5), k ^ 3, !k]).collect();
        let bytes = encode(&frames, 2, 2);
        let dec_ra = RandomAccessDecoder::new(&bytes).unwrap();

        let mut received: Vec<Vec<u16>> = Vec::new();
        let mut failures = 0usize;
        let mut dec = StreamingDecoder::new();
        {
            let mut cb = |pixels: Option<&[u16]>, _w: u32, _h: u32| match pixels {
                Some(p) => received.push(p.to_vec()),
                None => failures += 1,
            };
            for byte in &bytes {
                dec.feed(std::slice::from_ref(byte), &mut cb);
            }
            dec.finish(&mut cb);
        }

        assert_eq!(failures, 0);
        assert_eq!(received.len(), 50);
        assert_eq!(dec_ra.num_frames(), 50);
        for (i, frame) in received.iter().enumerate() {
            let mut out = vec![0u16; 4];
            dec_ra.decode_frame(i as u64, &mut out).unwrap();
            assert_eq!(frame, &out);
        }
    }

    #[test]
    fn truncated_stream_emits_partial_frames_then_one_failure() {
        let frames: Vec<Vec<u16>> = (0..10u16).map(|k| vec![k; 4]).collect();
        let bytes = encode(&frames, 2, 2);
        let truncated = &bytes[..bytes.len() - 50];

        let mut received = 0usize;
        let mut failures = 0usize;
        let mut dec = StreamingDecoder::new();
        {
            let mut cb = |pixels: Option<&[u16]>, _w: u32, _h: u32| match pixels {
                Some(_) => received += 1,
                None => failures += 1,
            };
            dec.feed(truncated, &mut cb);
            dec.finish(&mut cb);
        }

        assert!(received > 0);
        assert_eq!(failures, 1);
    }

    #[test]
    fn feed_after_terminal_error_is_a_no_op() {
        let mut dec = StreamingDecoder::new();
        let mut failures = 0usize;
        {
            let mut cb = |pixels: Option<&[u16]>, _w: u32, _h: u32| {
                if pixels.is_none() {
                    failures += 1;
                }
            };
            dec.feed(b"XXXXnotaheader!!", &mut cb);
            dec.feed(b"more garbage", &mut cb);
        }
        assert_eq!(failures, 1);
    }
}
