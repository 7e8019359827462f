use crate::error::VocoderError;
use crate::vocoder::executor::DEFAULT_BATCH_SIZES;
use crate::vocoder::fold::Crossfade;
use crate::vocoder::mol::DecodeMode;
use knuffel::Decode;
use serde::{Deserialize, Serialize};

/// On-disk configuration, read from a KDL document:
///
/// ```kdl
/// vocoder target=11000 overlap=550 hop-length=275 crossfade="linear"
/// decoder mode="sample" bits=9 seed=1234
/// batch-sizes 1 2 4 8 16 32 64 128 256
/// ```
#[derive(Decode, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mel2WaveConfig {
    #[knuffel(child)]
    pub vocoder: Option<VocoderSection>,
    #[knuffel(child)]
    pub decoder: Option<DecoderSection>,
    #[knuffel(child, unwrap(arguments), default)]
    pub batch_sizes: Vec<usize>,
}

#[derive(Decode, Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocoderSection {
    #[knuffel(property)]
    pub target: Option<usize>,
    #[knuffel(property)]
    pub overlap: Option<usize>,
    #[knuffel(property)]
    pub hop_length: Option<usize>,
    #[knuffel(property)]
    pub pad: Option<usize>,
    #[knuffel(property)]
    pub indent: Option<usize>,
    #[knuffel(property)]
    pub fade_frames: Option<usize>,
    #[knuffel(property)]
    pub crossfade: Option<String>,
    #[knuffel(property)]
    pub sample_rate: Option<u32>,
}

#[derive(Decode, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderSection {
    #[knuffel(property)]
    pub mode: Option<String>,
    #[knuffel(property)]
    pub bits: Option<u32>,
    #[knuffel(property)]
    pub seed: Option<u64>,
}

/// Fixed constants of one synthesis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocoderConfig {
    pub target: usize,
    pub overlap: usize,
    pub hop_length: usize,
    pub pad: usize,
    pub indent: usize,
    /// Fade-out length in mel frames.
    pub fade_frames: usize,
    pub batch_sizes: Vec<usize>,
    #[serde(skip)]
    pub crossfade: Crossfade,
    pub sample_rate: u32,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            target: 11000,
            overlap: 550,
            hop_length: 275,
            pad: 2,
            indent: 550,
            fade_frames: 20,
            batch_sizes: DEFAULT_BATCH_SIZES.to_vec(),
            crossfade: Crossfade::Linear,
            sample_rate: 22050,
        }
    }
}

impl VocoderConfig {
    pub fn fade_len(&self) -> usize {
        self.fade_frames * self.hop_length
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: String| Err(VocoderError::InvalidConfig(msg));
        if self.target == 0 || self.hop_length == 0 {
            return fail("target and hop-length must be positive".into());
        }
        if self.overlap == 0 || self.overlap > self.target {
            return fail(format!(
                "overlap must be in 1..={} (got {})",
                self.target, self.overlap
            ));
        }
        if self.batch_sizes.is_empty() {
            return fail("at least one batch size is required".into());
        }
        if let Some(b) = self.batch_sizes.iter().find(|b| !b.is_power_of_two()) {
            return fail(format!("batch size {} is not a power of two", b));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub mode: DecodeMode,
    pub bits: u32,
    pub seed: Option<u64>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mode: DecodeMode::Sample,
            bits: 9,
            seed: None,
        }
    }
}

impl Mel2WaveConfig {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config = knuffel::parse("config.kdl", content)?;
        Ok(config)
    }

    /// Fills unset values with defaults and validates the result.
    pub fn resolve(&self) -> anyhow::Result<(VocoderConfig, DecoderConfig)> {
        let mut vocoder = VocoderConfig::default();
        if let Some(v) = &self.vocoder {
            vocoder.target = v.target.unwrap_or(vocoder.target);
            vocoder.overlap = v.overlap.unwrap_or(vocoder.overlap);
            vocoder.hop_length = v.hop_length.unwrap_or(vocoder.hop_length);
            vocoder.pad = v.pad.unwrap_or(vocoder.pad);
            vocoder.indent = v.indent.unwrap_or(vocoder.indent);
            vocoder.fade_frames = v.fade_frames.unwrap_or(vocoder.fade_frames);
            vocoder.sample_rate = v.sample_rate.unwrap_or(vocoder.sample_rate);
            if let Some(shape) = &v.crossfade {
                vocoder.crossfade = shape.parse()?;
            }
        }
        if !self.batch_sizes.is_empty() {
            vocoder.batch_sizes = self.batch_sizes.clone();
        }
        vocoder.validate()?;

        let mut decoder = DecoderConfig::default();
        if let Some(d) = &self.decoder {
            if let Some(mode) = &d.mode {
                decoder.mode = mode.parse()?;
            }
            decoder.bits = d.bits.unwrap_or(decoder.bits);
            decoder.seed = d.seed.or(decoder.seed);
        }
        if decoder.bits == 0 || decoder.bits > 32 {
            anyhow::bail!("decoder bits must be in 1..=32 (got {})", decoder.bits);
        }
        Ok((vocoder, decoder))
    }
}
