pub mod api;
pub mod args;
pub mod audio;
pub mod error;
pub mod util;
pub mod vocoder;

pub use error::{Result, VocoderError};
pub use vocoder::WaveRnn;
