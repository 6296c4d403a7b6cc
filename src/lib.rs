//! A compressed video codec for high-frame-rate monochrome scientific
//! camera streams: per-pixel bit-shift preprocessing, delta-XOR
//! decorrelation against a reference frame, and an 8-context binary
//! arithmetic coder, wrapped in a self-contained container with a trailing
//! frame index. Frames compress independently of one another given the
//! reference frame, so [`encoder::ParallelEncoder`] pipelines them across a
//! worker pool while still emitting byte-identical output to a serial
//! encode.
//!
//! Module layout mirrors the dependency order of the pipeline: [`predictor`]
//! and [`entropy`] are the two leaf transforms, [`frame_codec`] orchestrates
//! them into one frame record, and [`container`] describes the wire format
//! that [`encoder`] writes and [`decoder`] reads back, either by random
//! access or as an incremental stream.

pub mod camera_format;
pub mod container;
pub mod decoder;
pub mod encoder;
pub mod entropy;
pub mod error;
pub mod frame_codec;
pub mod predictor;
pub mod varint;

pub use decoder::random_access::RandomAccessDecoder;
pub use decoder::streaming::StreamingDecoder;
pub use encoder::ParallelEncoder;
pub use error::{FpvError, Result};
