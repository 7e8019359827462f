pub mod chunk;
pub mod conditioning;
pub mod executor;
pub mod finalize;
pub mod fold;
pub mod mol;
pub mod synthesis;

use crate::api::config::VocoderConfig;
use crate::error::{Result, VocoderError};
use crate::vocoder::conditioning::ConditioningStage;
use crate::vocoder::executor::{BatchSizeTable, ModelExecutor};
use crate::vocoder::finalize::{finalize, wave_len};
use crate::vocoder::fold::FoldPlan;
use crate::vocoder::mol::SampleDecoder;
use crate::vocoder::synthesis::Synthesizer;
use log::{info, warn};
use ndarray::ArrayView3;

/// Two-stage neural vocoder: conditioning network followed by batched
/// autoregressive sampling over overlapping folds.
pub struct WaveRnn {
    conditioning: Box<dyn ModelExecutor>,
    recurrent: BatchSizeTable,
    config: VocoderConfig,
    pub mel_len: usize,
    pub mel_bins: usize,
    pub rnn_width: usize,
}

impl WaveRnn {
    pub fn new(
        conditioning: Box<dyn ModelExecutor>,
        recurrent: BatchSizeTable,
        config: VocoderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (mel_len, mel_bins) = {
            let stage = ConditioningStage::new(
                conditioning.as_ref(),
                config.pad,
                config.indent,
                config.hop_length,
            )?;
            (stage.mel_len, stage.mel_bins)
        };
        let rnn_width = Synthesizer::new(&recurrent)?.rnn_width;

        for size in &config.batch_sizes {
            if !recurrent.contains(*size) {
                warn!("No recurrent executor for configured batch size {}", size);
            }
        }
        info!(
            "Vocoder ready: mel_len={}, mel_bins={}, rnn_width={}, batch sizes {:?}",
            mel_len,
            mel_bins,
            rnn_width,
            recurrent.sizes()
        );
        Ok(Self {
            conditioning,
            recurrent,
            config,
            mel_len,
            mel_bins,
            rnn_width,
        })
    }

    pub fn config(&self) -> &VocoderConfig {
        &self.config
    }

    /// Converts a `(1, T, mel_bins)` mel-spectrogram into `(T-1) * hop_length` samples.
    pub fn forward(
        &self,
        mel: ArrayView3<f32>,
        decoder: &mut dyn SampleDecoder,
    ) -> Result<Vec<f64>> {
        let frames = mel.dim().1;
        if frames == 0 {
            return Err(VocoderError::EmptyMel);
        }
        let cfg = &self.config;

        let stage = ConditioningStage::new(
            self.conditioning.as_ref(),
            cfg.pad,
            cfg.indent,
            cfg.hop_length,
        )?;
        let conditioned = stage.forward(mel)?;

        let plan = FoldPlan::new(conditioned.len(), cfg.target, cfg.overlap);
        if !self.recurrent.contains(plan.num_folds) {
            return Err(VocoderError::InvalidBatchSize {
                batch: plan.num_folds,
                supported: self.recurrent.sizes(),
            });
        }
        let mels = plan.fold(conditioned.upsampled.view())?;
        let aux = plan.fold(conditioned.aux.view())?;

        let synth = Synthesizer::new(&self.recurrent)?;
        let samples = synth.run(&mels, &aux, decoder)?;

        let unfolded = plan.unfold(samples.view(), cfg.crossfade)?;
        let wave = finalize(unfolded, wave_len(frames, cfg.hop_length), cfg.fade_len());
        info!("Generated {} samples from {} mel frames", wave.len(), frames);
        Ok(wave)
    }
}
