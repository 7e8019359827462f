use crate::error::{Result, VocoderError};
use crate::vocoder::executor::{take_output, BatchSizeTable, TensorMap};
use crate::vocoder::mol::SampleDecoder;
use log::{debug, info};
use ndarray::{s, Array2, Array3, Axis, Ix2};
use std::time::Instant;

/// Hidden state carried between recurrent steps, one row per fold.
#[derive(Debug, Clone)]
pub struct RecurrentState {
    pub h1: Array2<f32>,
    pub h2: Array2<f32>,
    pub x: Array2<f32>,
}

impl RecurrentState {
    pub fn zeros(batch: usize, rnn_width: usize) -> Self {
        Self {
            h1: Array2::zeros((batch, rnn_width)),
            h2: Array2::zeros((batch, rnn_width)),
            x: Array2::zeros((batch, 1)),
        }
    }
}

/// Sample-by-sample decoding across a batch of folded windows.
pub struct Synthesizer<'a> {
    table: &'a BatchSizeTable,
    pub rnn_width: usize,
}

impl<'a> Synthesizer<'a> {
    pub fn new(table: &'a BatchSizeTable) -> Result<Self> {
        let declared = table
            .input_shape("h1")
            .ok_or_else(|| VocoderError::shape("h1", "a declared input shape", &[]))?;
        if declared.len() != 2 {
            return Err(VocoderError::shape("h1", "(batch, rnn_width)", &declared));
        }
        Ok(Self {
            table,
            rnn_width: declared[1],
        })
    }

    /// Runs the recurrence over every timestep of the folded conditioning.
    /// Returns a `(folds, window_len)` matrix of samples.
    pub fn run(
        &self,
        mels: &Array3<f32>,
        aux: &Array3<f32>,
        decoder: &mut dyn SampleDecoder,
    ) -> Result<Array2<f64>> {
        let (batch, steps, _) = mels.dim();
        let executor = self.table.get(batch)?;

        let (aux_batch, aux_steps, aux_channels) = aux.dim();
        if aux_batch != batch || aux_steps != steps || aux_channels % 4 != 0 {
            return Err(VocoderError::shape(
                "aux",
                format!("({}, {}, 4k)", batch, steps),
                aux.shape(),
            ));
        }
        let quarter = aux_channels / 4;

        info!(
            "Synthesizing {} steps across {} fold(s)",
            steps, batch
        );
        let started = Instant::now();
        let mut state = RecurrentState::zeros(batch, self.rnn_width);
        let mut output = Array2::<f64>::zeros((batch, steps));

        for i in 0..steps {
            let mut inputs = TensorMap::new();
            inputs.insert(
                "m_t".to_string(),
                mels.index_axis(Axis(1), i).to_owned().into_dyn(),
            );
            let a_t = aux.index_axis(Axis(1), i);
            for q in 0..4 {
                inputs.insert(
                    format!("a{}_t", q + 1),
                    a_t.slice(s![.., q * quarter..(q + 1) * quarter])
                        .to_owned()
                        .into_dyn(),
                );
            }
            inputs.insert("h1".to_string(), state.h1.clone().into_dyn());
            inputs.insert("h2".to_string(), state.h2.clone().into_dyn());
            inputs.insert("x".to_string(), state.x.clone().into_dyn());

            let mut outputs = executor.infer(inputs)?;
            let logits = take_output::<Ix2>(&mut outputs, "logits")?;
            state.h1 = self.hidden(&mut outputs, "h1", batch)?;
            state.h2 = self.hidden(&mut outputs, "h2", batch)?;
            if logits.nrows() != batch {
                return Err(VocoderError::shape(
                    "logits",
                    format!("({}, params)", batch),
                    logits.shape(),
                ));
            }

            let samples = decoder.decode(logits.view())?;
            if samples.len() != batch {
                return Err(VocoderError::shape(
                    "samples",
                    format!("{} values", batch),
                    &[samples.len()],
                ));
            }
            for (b, &v) in samples.iter().enumerate() {
                state.x[[b, 0]] = v;
                output[[b, i]] = v as f64;
            }

            if (i + 1) % 1000 == 0 {
                debug!("Step {}/{}", i + 1, steps);
            }
        }

        info!(
            "Synthesized {} samples in {:.2?}",
            batch * steps,
            started.elapsed()
        );
        Ok(output)
    }

    fn hidden(&self, outputs: &mut TensorMap, name: &str, batch: usize) -> Result<Array2<f32>> {
        let h = take_output::<Ix2>(outputs, name)?;
        if h.dim() != (batch, self.rnn_width) {
            return Err(VocoderError::shape(
                name,
                format!("({}, {})", batch, self.rnn_width),
                h.shape(),
            ));
        }
        Ok(h)
    }
}
