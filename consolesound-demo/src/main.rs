mod cli;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// ConsoleSound demo - plays a WAV clip and/or a synthesised tone until the
/// timer runs out or the process is asked to close
#[derive(Parser, Debug)]
#[command(name = "consolesound-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// 16-bit 44100 Hz WAV file to play
    #[arg(value_name = "FILE")]
    pub clip: Option<PathBuf>,

    /// Loop the clip instead of playing it once
    #[arg(short = 'l', long = "loop")]
    pub looping: bool,

    /// Seconds to run before shutting down; 0 runs until Ctrl+C
    #[arg(short, long, default_value_t = 5.0)]
    pub seconds: f32,

    /// Add a sine tone at this frequency (Hz)
    #[arg(short, long, value_name = "HZ")]
    pub tone: Option<f32>,

    /// Output volume in percent
    #[arg(long, default_value_t = 100.0)]
    pub volume: f32,

    /// Output channels
    #[arg(long, default_value_t = 1)]
    pub channels: u16,

    /// Number of blocks in the output ring
    #[arg(long, default_value_t = 8)]
    pub blocks: usize,

    /// Interleaved samples per block
    #[arg(long, default_value_t = 512)]
    pub block_samples: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    cli::run(args)
}
