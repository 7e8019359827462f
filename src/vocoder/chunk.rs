use crate::error::{Result, VocoderError};
use log::debug;
use ndarray::{s, Array3, ArrayView3};

/// Surrounds a `(1, L, F)` chunk with `pad` zero frames on each side of the
/// time axis.
pub fn pad_context(chunk: ArrayView3<f32>, pad: usize) -> Result<Array3<f32>> {
    let (batch, len, bins) = chunk.dim();
    if batch != 1 {
        return Err(VocoderError::shape("mels", "batch of 1", chunk.shape()));
    }
    let mut padded = Array3::zeros((1, len + 2 * pad, bins));
    padded.slice_mut(s![.., pad..pad + len, ..]).assign(&chunk);
    Ok(padded)
}

/// Splits a mel sequence into fixed-length pieces matching the conditioning
/// network's input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub frames: usize,
    pub mel_len: usize,
    pub num_chunks: usize,
    /// Zero frames appended to the last chunk.
    pub last_padding: usize,
}

impl ChunkPlan {
    pub fn new(frames: usize, mel_len: usize) -> Result<Self> {
        if frames == 0 {
            return Err(VocoderError::EmptyMel);
        }
        if mel_len == 0 {
            return Err(VocoderError::InvalidConfig("mel_len must be positive".into()));
        }
        let num_chunks = frames.div_ceil(mel_len);
        let last_padding = num_chunks * mel_len - frames;
        debug!(
            "Chunk plan: {} frames -> {} chunks of {}, last padded by {}",
            frames, num_chunks, mel_len, last_padding
        );
        Ok(Self {
            frames,
            mel_len,
            num_chunks,
            last_padding,
        })
    }

    /// Samples to drop from the tail of the concatenated conditioning output.
    pub fn trailing_trim(&self, hop_length: usize) -> usize {
        self.last_padding * hop_length
    }

    /// Copies chunk `index` out of `mel`, zero-filling past the last frame.
    pub fn chunk(&self, mel: ArrayView3<f32>, index: usize) -> Array3<f32> {
        let bins = mel.dim().2;
        let start = index * self.mel_len;
        let end = (start + self.mel_len).min(self.frames);
        let mut out = Array3::zeros((1, self.mel_len, bins));
        if start < end {
            out.slice_mut(s![.., ..end - start, ..])
                .assign(&mel.slice(s![..1, start..end, ..]));
        }
        out
    }
}
