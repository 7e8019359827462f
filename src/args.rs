use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mel-spectrogram to waveform with a folded autoregressive vocoder.")]
pub struct Cli {
    /// Mel-spectrogram file (bincode frames).
    #[arg(index = 1)]
    pub mel_file: PathBuf,
    /// Output WAV path.
    #[arg(index = 2)]
    pub out_file: PathBuf,

    /// Backend library providing the model executors.
    #[arg(long, short = 'b')]
    pub backend: PathBuf,
    /// KDL configuration file. Defaults to the user config directory.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub sample_rate: Option<u32>,
    /// Seed for reproducible sampling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Emit the most likely sample instead of sampling.
    #[arg(long)]
    pub greedy: bool,
}
