pub mod plugin;
pub mod config;

pub use plugin::{build_executors, BackendLoader, BackendMetadata, BackendPlugin};
pub use config::{DecoderConfig, Mel2WaveConfig, VocoderConfig};
