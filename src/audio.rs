use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Mel-spectrogram as stored on disk: one row of mel bins per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelSpectrogram {
    pub frames: Vec<Vec<f32>>,
}

impl MelSpectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.frames.first().map_or(0, |f| f.len())
    }

    /// Lays the frames out as a `(1, T, F)` tensor.
    pub fn to_array(&self) -> Result<Array3<f32>> {
        let bins = self.num_bins();
        if let Some(i) = self.frames.iter().position(|f| f.len() != bins) {
            anyhow::bail!("Frame {} has {} bins, expected {}", i, self.frames[i].len(), bins);
        }
        let flat: Vec<f32> = self.frames.iter().flatten().copied().collect();
        Ok(Array3::from_shape_vec((1, self.frames.len(), bins), flat)?)
    }

    pub fn from_array(mel: ArrayView3<f32>) -> Self {
        let frames = mel
            .outer_iter()
            .next()
            .map(|m| m.outer_iter().map(|row| row.to_vec()).collect())
            .unwrap_or_default();
        Self { frames }
    }
}

pub fn load_mel<P: AsRef<Path>>(path: P) -> Result<MelSpectrogram> {
    let path = path.as_ref();
    info!("Loading mel-spectrogram from {}", path.display());
    let file = File::open(path)
        .with_context(|| format!("Failed to open mel file: {}", path.display()))?;
    let mel: MelSpectrogram = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("Failed to decode mel file: {}", path.display()))?;
    info!("Loaded {} frames x {} bins", mel.num_frames(), mel.num_bins());
    Ok(mel)
}

pub fn save_mel<P: AsRef<Path>>(path: P, mel: &MelSpectrogram) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create mel file: {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), mel)?;
    Ok(())
}

pub fn save_audio<P: AsRef<Path>>(path: P, samples: &[f64], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    info!("Saving {} samples to {}", samples.len(), path.display());
    let file = File::create(path)
        .with_context(|| format!("Failed to create audio file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_wav(&mut out, samples, sample_rate)?;
    out.flush()?;
    Ok(())
}

/// 16-bit PCM mono. Samples outside [-1, 1] are clamped.
pub fn write_wav<W: Write>(out: &mut W, samples: &[f64], sample_rate: u32) -> Result<()> {
    let num_channels = 1u16;
    let bits_per_sample = 16u16;
    let block_align = num_channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (samples.len() * block_align as usize) as u32;

    debug!("Writing WAV: rate={}, data bytes={}", sample_rate, data_size);

    out.write_all(b"RIFF")?;
    out.write_all(&(36 + data_size).to_le_bytes())?;
    out.write_all(b"WAVE")?;

    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&num_channels.to_le_bytes())?;
    out.write_all(&sample_rate.to_le_bytes())?;
    out.write_all(&byte_rate.to_le_bytes())?;
    out.write_all(&block_align.to_le_bytes())?;
    out.write_all(&bits_per_sample.to_le_bytes())?;

    out.write_all(b"data")?;
    out.write_all(&data_size.to_le_bytes())?;
    for &sample in samples {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
        out.write_all(&pcm.to_le_bytes())?;
    }
    Ok(())
}
