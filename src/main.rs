use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use mel2wave::api::{build_executors, BackendLoader, Mel2WaveConfig};
use mel2wave::args::Cli;
use mel2wave::audio;
use mel2wave::vocoder::mol::{DecodeMode, MixtureOfLogistics};
use mel2wave::WaveRnn;
use std::process;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("Error: {:#}", e);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Mel2WaveConfig> {
    if let Some(path) = &cli.config {
        return Mel2WaveConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()));
    }
    if let Some(dirs) = ProjectDirs::from("com", "mel2wave", "mel2wave") {
        let path = dirs.config_dir().join("config.kdl");
        if path.exists() {
            log::info!("Using config {}", path.display());
            return Mel2WaveConfig::load(&path)
                .with_context(|| format!("Failed to load config: {}", path.display()));
        }
    }
    Ok(Mel2WaveConfig::default())
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let (mut vocoder_cfg, mut decoder_cfg) = load_config(&cli)?.resolve()?;
    if let Some(rate) = cli.sample_rate {
        vocoder_cfg.sample_rate = rate;
    }
    if cli.seed.is_some() {
        decoder_cfg.seed = cli.seed;
    }
    if cli.greedy {
        decoder_cfg.mode = DecodeMode::Greedy;
    }

    let mut loader = unsafe {
        BackendLoader::load(&cli.backend)
            .with_context(|| format!("Failed to load backend: {}", cli.backend.display()))?
    };
    let (conditioning, recurrent) = build_executors(loader.plugin(), &vocoder_cfg)?;
    let sample_rate = vocoder_cfg.sample_rate;
    let vocoder = WaveRnn::new(conditioning, recurrent, vocoder_cfg)?;

    let mel = audio::load_mel(&cli.mel_file)?.to_array()?;
    let mut decoder = MixtureOfLogistics::new(decoder_cfg.mode, decoder_cfg.bits, decoder_cfg.seed);
    let wave = vocoder
        .forward(mel.view(), &mut decoder)
        .context("Synthesis failed")?;

    audio::save_audio(&cli.out_file, &wave, sample_rate)
        .with_context(|| format!("Failed to save audio to {}", cli.out_file.display()))?;

    // Executors run code from the backend library; drop them first.
    drop(vocoder);
    drop(loader);
    Ok(())
}
