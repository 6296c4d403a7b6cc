// CLI driver: reads a camera-sequence file, compresses it into an .fpv
// container, or reports on an existing container. Argument parsing and
// logging follow the same shape as `anni`'s binary (`clap::Parser` +
// `env_logger` initialized from an env var, `log::info!` for progress).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fpv_codec::camera_format::CameraSequenceReader;
use fpv_codec::decoder::random_access::RandomAccessDecoder;
use fpv_codec::encoder::ParallelEncoder;

#[derive(Parser, Debug)]
#[command(name = "fpv", version, about = "Compressed video codec for high-frame-rate scientific camera streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a camera-sequence file into an .fpv container.
    Encode {
        input: PathBuf,
        output: PathBuf,
        /// Right-shift applied to each pixel before delta coding (0-8).
        #[arg(long, default_value_t = 0)]
        shift: u8,
        /// Treat input pixels as big-endian on the wire.
        #[arg(long)]
        big_endian: bool,
        /// Number of worker threads.
        #[arg(long, default_value_t = 1)]
        threads: usize,
    },
    /// Print the dimensions and frame count of an .fpv container.
    Info { input: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Encode {
            input,
            output,
            shift,
            big_endian,
            threads,
        } => run_encode(&input, &output, shift, big_endian, threads),
        Command::Info { input } => run_info(&input),
    }
}

fn run_encode(input: &PathBuf, output: &PathBuf, shift: u8, big_endian: bool, threads: usize) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = CameraSequenceReader::new(BufReader::new(file))
        .with_context(|| format!("parsing camera sequence header in {}", input.display()))?;

    log::info!(
        "encoding {}x{} sequence ({} frames) from {}",
        reader.width(),
        reader.height(),
        reader.kept_frame_count(),
        input.display()
    );

    let out_file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut out = BufWriter::new(out_file);
    let mut sink = |bytes: &[u8]| {
        out.write_all(bytes).expect("writing to output file");
    };

    let mut enc = ParallelEncoder::new(threads, shift, big_endian);
    let (_, first) = reader
        .read_frame()?
        .context("camera sequence contains no frames")?;
    enc.init(&first, reader.width(), reader.height(), &mut sink)?;

    let mut frame_count = 1u64;
    while let Some((_, pixels)) = reader.read_frame()? {
        enc.compress_frame(&pixels, &mut sink)?;
        frame_count += 1;
    }
    enc.finish(&mut sink)?;

    log::info!("wrote {} frames to {}", frame_count, output.display());
    Ok(())
}

fn run_info(input: &PathBuf) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let dec = RandomAccessDecoder::new(&bytes)
        .with_context(|| format!("parsing container {}", input.display()))?;
    let (width, height) = dec.dimensions();
    println!("{}: {}x{}, {} frames", input.display(), width, height, dec.num_frames());
    Ok(())
}
