use crate::util::linspace;
use log::debug;

/// Number of samples the finished waveform carries for `frames` mel frames.
pub fn wave_len(frames: usize, hop_length: usize) -> usize {
    frames.saturating_sub(1) * hop_length
}

/// Truncates to `wave_len` samples and fades the last `fade_len` to silence.
pub fn finalize(mut samples: Vec<f64>, wave_len: usize, fade_len: usize) -> Vec<f64> {
    samples.truncate(wave_len);
    let fade_len = fade_len.min(samples.len());
    let start = samples.len() - fade_len;
    for (s, g) in samples[start..].iter_mut().zip(linspace(1.0, 0.0, fade_len, true)) {
        *s *= g;
    }
    debug!("Finalized {} samples ({} faded)", samples.len(), fade_len);
    samples
}
