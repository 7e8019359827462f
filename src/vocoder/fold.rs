use crate::error::{Result, VocoderError};
use crate::util::{lerp, linspace};
use log::debug;
use ndarray::{s, Array3, ArrayView2};
use std::str::FromStr;

/// Weight curve used across fold boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Crossfade {
    #[default]
    Linear,
    EqualPower,
}

impl Crossfade {
    /// Mixes the outgoing and incoming fold at ramp position `t` in [0, 1].
    pub fn blend(self, outgoing: f64, incoming: f64, t: f64) -> f64 {
        match self {
            Crossfade::Linear => lerp(outgoing, incoming, t),
            Crossfade::EqualPower => outgoing * (1.0 - t).sqrt() + incoming * t.sqrt(),
        }
    }
}

impl FromStr for Crossfade {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Crossfade::Linear),
            "equal-power" | "equal_power" => Ok(Crossfade::EqualPower),
            other => Err(anyhow::anyhow!("Unknown crossfade shape: {}", other)),
        }
    }
}

/// Window layout shared by every sequence folded for one synthesis call.
///
/// Window `i` covers source samples `[i*target - overlap, (i+1)*target + overlap)`,
/// zero-filled outside `[0, source_len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldPlan {
    pub source_len: usize,
    pub target: usize,
    pub overlap: usize,
    pub num_folds: usize,
    /// Blend length at the final fold boundary.
    pub dynamic_overlap: usize,
}

impl FoldPlan {
    pub fn new(source_len: usize, target: usize, overlap: usize) -> Self {
        let num_folds = source_len.div_ceil(target);
        let shortfall = num_folds * target - source_len;
        let dynamic_overlap = overlap.saturating_sub(shortfall);
        debug!(
            "Fold plan: {} samples -> {} folds of {} (dynamic overlap {})",
            source_len,
            num_folds,
            target + 2 * overlap,
            dynamic_overlap
        );
        Self {
            source_len,
            target,
            overlap,
            num_folds,
            dynamic_overlap,
        }
    }

    pub fn window_len(&self) -> usize {
        self.target + 2 * self.overlap
    }

    /// Length of the unfolded sequence, aligned to source sample 0.
    pub fn unfolded_len(&self) -> usize {
        self.num_folds * self.target
    }

    /// Folds a `(source_len, channels)` sequence into `(num_folds, window_len, channels)`.
    pub fn fold(&self, x: ArrayView2<f32>) -> Result<Array3<f32>> {
        let (len, channels) = x.dim();
        if len != self.source_len {
            return Err(VocoderError::shape(
                "fold input",
                format!("({}, channels)", self.source_len),
                x.shape(),
            ));
        }
        let mut folded = Array3::zeros((self.num_folds, self.window_len(), channels));
        for i in 0..self.num_folds {
            let start = (i * self.target) as isize - self.overlap as isize;
            let lo = start.max(0) as usize;
            let hi = ((i + 1) * self.target + self.overlap).min(len);
            if lo >= hi {
                continue;
            }
            let dst = (lo as isize - start) as usize;
            folded
                .slice_mut(s![i, dst..dst + (hi - lo), ..])
                .assign(&x.slice(s![lo..hi, ..]));
        }
        Ok(folded)
    }

    /// Stitches `(num_folds, window_len)` samples back into one sequence,
    /// cross-fading across each fold boundary.
    pub fn unfold(&self, y: ArrayView2<f64>, crossfade: Crossfade) -> Result<Vec<f64>> {
        if y.dim() != (self.num_folds, self.window_len()) {
            return Err(VocoderError::shape(
                "unfold input",
                format!("({}, {})", self.num_folds, self.window_len()),
                y.shape(),
            ));
        }
        let (t, o) = (self.target, self.overlap);
        let mut out = vec![0.0; self.unfolded_len()];

        for (i, row) in y.outer_iter().enumerate() {
            for (dst, &v) in out[i * t..(i + 1) * t].iter_mut().zip(row.slice(s![o..o + t])) {
                *dst = v;
            }
        }

        for i in 1..self.num_folds {
            let len = if i + 1 == self.num_folds {
                self.dynamic_overlap
            } else {
                o
            };
            let boundary = i * t;
            let begin = boundary - len / 2;
            for (j, w) in linspace(0.0, 1.0, len, true).into_iter().enumerate() {
                let p = begin + j;
                let outgoing = y[[i - 1, p + t + o - boundary]];
                let incoming = y[[i, p + o - boundary]];
                out[p] = crossfade.blend(outgoing, incoming, w);
            }
        }
        Ok(out)
    }
}
