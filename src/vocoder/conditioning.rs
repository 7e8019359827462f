use crate::error::{Result, VocoderError};
use crate::vocoder::chunk::{pad_context, ChunkPlan};
use crate::vocoder::executor::{take_output, ModelExecutor, TensorMap};
use log::{debug, info};
use ndarray::{concatenate, s, Array2, ArrayView3, Axis, Ix3};

/// Continuous conditioning sequences at sample resolution, `(time, channels)`.
#[derive(Debug, Clone)]
pub struct Conditioning {
    pub upsampled: Array2<f32>,
    pub aux: Array2<f32>,
}

impl Conditioning {
    pub fn len(&self) -> usize {
        self.upsampled.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives the upsampling network over a chunked mel sequence.
pub struct ConditioningStage<'a> {
    executor: &'a dyn ModelExecutor,
    pub mel_len: usize,
    pub mel_bins: usize,
    pub pad: usize,
    pub indent: usize,
    pub hop_length: usize,
}

impl<'a> ConditioningStage<'a> {
    pub fn new(
        executor: &'a dyn ModelExecutor,
        pad: usize,
        indent: usize,
        hop_length: usize,
    ) -> Result<Self> {
        let declared = executor
            .input_shape("mels")
            .ok_or_else(|| VocoderError::shape("mels", "a declared input shape", &[]))?;
        if declared.len() != 3 || declared[1] <= 2 * pad {
            return Err(VocoderError::shape(
                "mels",
                format!("(1, mel_len + {}, mel_bins)", 2 * pad),
                &declared,
            ));
        }
        Ok(Self {
            executor,
            mel_len: declared[1] - 2 * pad,
            mel_bins: declared[2],
            pad,
            indent,
            hop_length,
        })
    }

    /// Runs the network on one padded chunk and strips the context margin
    /// from the upsampled output.
    pub fn forward_chunk(&self, chunk: ArrayView3<f32>) -> Result<Conditioning> {
        let padded = pad_context(chunk, self.pad)?;
        let mut inputs = TensorMap::new();
        inputs.insert("mels".to_string(), padded.into_dyn());

        let mut outputs = self.executor.infer(inputs)?;
        let upsampled = take_output::<Ix3>(&mut outputs, "upsample_mels")?;
        let aux = take_output::<Ix3>(&mut outputs, "aux")?;

        if upsampled.dim().0 != 1 {
            return Err(VocoderError::shape("upsample_mels", "batch of 1", upsampled.shape()));
        }
        if aux.dim().0 != 1 {
            return Err(VocoderError::shape("aux", "batch of 1", aux.shape()));
        }
        let (_, time, _) = upsampled.dim();
        if time <= 2 * self.indent {
            return Err(VocoderError::shape(
                "upsample_mels",
                format!("more than {} time steps", 2 * self.indent),
                upsampled.shape(),
            ));
        }
        let upsampled = upsampled
            .slice(s![0, self.indent..time - self.indent, ..])
            .to_owned();
        let aux = aux.index_axis_move(Axis(0), 0);

        if aux.nrows() != upsampled.nrows() {
            return Err(VocoderError::shape(
                "aux",
                format!("{} time steps", upsampled.nrows()),
                aux.shape(),
            ));
        }
        if aux.ncols() % 4 != 0 {
            return Err(VocoderError::shape("aux", "channels divisible by 4", aux.shape()));
        }
        Ok(Conditioning { upsampled, aux })
    }

    /// Conditions the whole sequence: chunk, run, concatenate, trim the pad.
    pub fn forward(&self, mel: ArrayView3<f32>) -> Result<Conditioning> {
        let (batch, frames, bins) = mel.dim();
        if batch != 1 || bins != self.mel_bins {
            return Err(VocoderError::shape(
                "mels",
                format!("(1, T, {})", self.mel_bins),
                mel.shape(),
            ));
        }
        let plan = ChunkPlan::new(frames, self.mel_len)?;
        info!(
            "Conditioning {} mel frames in {} chunk(s)",
            frames, plan.num_chunks
        );

        let mut upsampled = Vec::with_capacity(plan.num_chunks);
        let mut aux = Vec::with_capacity(plan.num_chunks);
        for i in 0..plan.num_chunks {
            let chunk = plan.chunk(mel, i);
            let out = self.forward_chunk(chunk.view())?;
            debug!("Chunk {}/{} -> {} samples", i + 1, plan.num_chunks, out.len());
            upsampled.push(out.upsampled);
            aux.push(out.aux);
        }

        let upsampled = join_time(&upsampled, "upsample_mels")?;
        let aux = join_time(&aux, "aux")?;

        let trim = plan.trailing_trim(self.hop_length);
        let keep = upsampled.nrows().saturating_sub(trim);
        Ok(Conditioning {
            upsampled: upsampled.slice(s![..keep, ..]).to_owned(),
            aux: aux.slice(s![..keep, ..]).to_owned(),
        })
    }
}

fn join_time(parts: &[Array2<f32>], name: &str) -> Result<Array2<f32>> {
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    concatenate(Axis(0), &views).map_err(|_| {
        let widths: Vec<usize> = parts.iter().map(|p| p.ncols()).collect();
        VocoderError::shape(name, "a constant channel count across chunks", &widths)
    })
}
