// C4: parallel encoder.
//
// A bounded worker pool plus a reorder buffer, grounded on the thread +
// channel pattern `anni-playback`'s `player.rs` uses to run its decoder on
// a dedicated thread communicating back via a channel — generalized here
// to N workers and a sequence-numbered reorder stage so submission order
// survives concurrent completion order: parallelism is purely an
// implementation optimization with no observable effect on output bytes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use crate::container::{self, ContainerHeader};
use crate::error::{FpvError, Result};
use crate::frame_codec;
use crate::predictor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Running,
    Finished,
}

struct Job {
    seq: u64,
    frame: Arc<Vec<u16>>,
}

type WorkerResult = (u64, Vec<u8>);

/// Compresses frames against a shared reference (delta) frame using a pool
/// of worker threads, writing a complete container to the caller-supplied
/// sink in submission order regardless of how the workers interleave.
pub struct ParallelEncoder {
    state: State,
    shift: u8,
    big_endian: bool,
    num_threads: usize,
    width: u32,
    height: u32,
    pixel_count: usize,
    max_queued: usize,

    job_tx: Option<Sender<Job>>,
    result_rx: Option<Receiver<WorkerResult>>,
    workers: Vec<thread::JoinHandle<()>>,

    next_seq: u64,
    next_emit: u64,
    in_flight: usize,
    pending: BTreeMap<u64, Vec<u8>>,

    bytes_written: u64,
    offsets: Vec<u64>,
}

impl ParallelEncoder {
    /// Construct an encoder with `num_threads` workers (at least 1),
    /// preprocessing every frame with `shift`/`big_endian` before coding.
    pub fn new(num_threads: usize, shift: u8, big_endian: bool) -> Self {
        ParallelEncoder {
            state: State::Uninitialized,
            shift,
            big_endian,
            num_threads: num_threads.max(1),
            width: 0,
            height: 0,
            pixel_count: 0,
            max_queued: num_threads.max(1) + 2,
            job_tx: None,
            result_rx: None,
            workers: Vec::new(),
            next_seq: 0,
            next_emit: 0,
            in_flight: 0,
            pending: BTreeMap::new(),
            bytes_written: 0,
            offsets: Vec::new(),
        }
    }

    /// Maximum number of frames that may be in flight at once.
    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    /// Establish dimensions and the reference frame from `first_frame`,
    /// write the container header and the delta frame's record. Must be
    /// called exactly once, before any `compress_frame` call.
    pub fn init(
        &mut self,
        first_frame: &[u16],
        width: u32,
        height: u32,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(FpvError::StateError("init called more than once"));
        }
        let pixel_count = predictor::validate_dimensions(width, height)?;
        if first_frame.len() != pixel_count {
            return Err(FpvError::InvalidArgument(
                "first frame length does not match W*H".to_string(),
            ));
        }

        let header = ContainerHeader {
            width,
            height,
            shift: self.shift,
            big_endian: self.big_endian,
        };
        let mut header_bytes = Vec::new();
        header.write(&mut header_bytes)?;
        sink(&header_bytes);
        self.bytes_written = header_bytes.len() as u64;

        let zero_d = vec![0u16; pixel_count];
        let delta_record = frame_codec::encode_frame(first_frame, &zero_d, self.shift, self.big_endian)?;
        self.offsets.push(self.bytes_written);
        sink(&delta_record);
        self.bytes_written += delta_record.len() as u64;

        let delta = predictor::preprocess(first_frame, self.shift, self.big_endian)?;
        let num_threads = self.num_threads;
        log::info!(
            "encoder initialized: {}x{} ({} px), shift={}, big_endian={}, {} worker(s)",
            width,
            height,
            pixel_count,
            self.shift,
            self.big_endian,
            num_threads
        );
        self.spawn_workers(num_threads, Arc::new(delta));

        self.width = width;
        self.height = height;
        self.pixel_count = pixel_count;
        self.next_seq = 1;
        self.next_emit = 1;
        self.state = State::Initialized;
        Ok(())
    }

    fn spawn_workers(&mut self, num_threads: usize, delta: Arc<Vec<u16>>) {
        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (result_tx, result_rx) = channel::unbounded::<WorkerResult>();
        let shift = self.shift;
        let big_endian = self.big_endian;

        for i in 0..num_threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let delta = Arc::clone(&delta);
            log::debug!("spawning encoder worker {i}");
            let handle = thread::Builder::new()
                .name(format!("fpv-encoder-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let record = frame_codec::encode_frame(&job.frame, &delta, shift, big_endian)
                            .expect("frame length validated by coordinator before submission");
                        if result_tx.send((job.seq, record)).is_err() {
                            break;
                        }
                    }
                })
                .expect("spawning an encoder worker thread");
            self.workers.push(handle);
        }

        self.job_tx = Some(job_tx);
        self.result_rx = Some(result_rx);
    }

    /// Submit one frame for compression; blocks if `max_queued` frames are
    /// already in flight. Never reorders output: records reach `sink` in
    /// submission order no matter how workers complete.
    pub fn compress_frame(&mut self, frame: &[u16], sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.state == State::Uninitialized {
            return Err(FpvError::StateError("compress_frame called before init"));
        }
        if self.state == State::Finished {
            return Err(FpvError::StateError("compress_frame called after finish"));
        }
        if frame.len() != self.pixel_count {
            return Err(FpvError::InvalidArgument(
                "frame length does not match W*H".to_string(),
            ));
        }
        self.state = State::Running;

        if self.in_flight >= self.max_queued {
            log::debug!("compress_frame blocking: {} frame(s) in flight >= max_queued {}", self.in_flight, self.max_queued);
        }
        while self.in_flight >= self.max_queued {
            self.recv_one_blocking(sink)?;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight += 1;
        self.job_tx
            .as_ref()
            .expect("workers spawned in init")
            .send(Job {
                seq,
                frame: Arc::new(frame.to_vec()),
            })
            .map_err(|_| FpvError::StateError("encoder worker pool has shut down"))?;

        self.drain_ready(sink);
        Ok(())
    }

    /// Block until one worker result arrives, then fold it into the
    /// reorder buffer and flush whatever contiguous prefix is now ready.
    fn recv_one_blocking(&mut self, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        let (seq, bytes) = self
            .result_rx
            .as_ref()
            .expect("workers spawned in init")
            .recv()
            .map_err(|_| FpvError::StateError("encoder worker pool has shut down"))?;
        self.in_flight -= 1;
        self.pending.insert(seq, bytes);
        self.flush_ready(sink);
        Ok(())
    }

    /// Drain every result that is already available without blocking.
    fn drain_ready(&mut self, sink: &mut dyn FnMut(&[u8])) {
        while let Ok((seq, bytes)) = self
            .result_rx
            .as_ref()
            .expect("workers spawned in init")
            .try_recv()
        {
            self.in_flight -= 1;
            self.pending.insert(seq, bytes);
        }
        self.flush_ready(sink);
    }

    /// Emit the contiguous prefix of `pending` starting at `next_emit`.
    fn flush_ready(&mut self, sink: &mut dyn FnMut(&[u8])) {
        while let Some(bytes) = self.pending.remove(&self.next_emit) {
            self.offsets.push(self.bytes_written);
            sink(&bytes);
            self.bytes_written += bytes.len() as u64;
            self.next_emit += 1;
        }
    }

    /// Drain all workers, emit the frame index block and footer.
    pub fn finish(&mut self, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.state == State::Uninitialized {
            return Err(FpvError::StateError("finish called before init"));
        }
        if self.state == State::Finished {
            return Err(FpvError::StateError("finish called more than once"));
        }

        // Closing the job sender lets every worker's `recv` loop exit once
        // its queue drains, without losing any already-submitted job.
        self.job_tx = None;
        while self.next_emit < self.next_seq {
            self.recv_one_blocking(sink)?;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        let index_offset = self.bytes_written;
        let mut index_bytes = Vec::new();
        container::write_index_block(&mut index_bytes, &self.offsets)?;
        sink(&index_bytes);
        self.bytes_written += index_bytes.len() as u64;

        let mut footer_bytes = Vec::new();
        container::write_footer(&mut footer_bytes, index_offset, self.offsets.len() as u64)?;
        sink(&footer_bytes);

        log::info!("encoder finished: {} frame(s), {} bytes total", self.offsets.len(), self.bytes_written + footer_bytes.len() as u64);
        self.state = State::Finished;
        Ok(())
    }
}
