use crate::error::{Result, VocoderError};
use crate::util::quantize;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Turns one timestep of network output into one sample per batch row.
/// Every returned sample lies in [-1, 1].
pub trait SampleDecoder {
    fn decode(&mut self, logits: ArrayView2<f32>) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    #[default]
    Sample,
    Greedy,
}

impl FromStr for DecodeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" => Ok(DecodeMode::Sample),
            "greedy" => Ok(DecodeMode::Greedy),
            other => Err(anyhow::anyhow!("Unknown decode mode: {}", other)),
        }
    }
}

const LOG_SCALE_MIN: f64 = -32.236191301916641; // ln(1e-14)
const U_EPS: f64 = 1e-5;

/// Discretized mixture of logistics. Each logits row is laid out as
/// `[mixture logits | means | log scales]`, one block per component.
pub struct MixtureOfLogistics {
    mode: DecodeMode,
    bits: u32,
    rng: StdRng,
}

impl MixtureOfLogistics {
    pub fn new(mode: DecodeMode, bits: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { mode, bits, rng }
    }

    pub fn greedy(bits: u32) -> Self {
        Self::new(DecodeMode::Greedy, bits, Some(0))
    }

    fn uniform(&mut self) -> f64 {
        self.rng.gen_range(U_EPS..1.0 - U_EPS)
    }

    fn decode_row(&mut self, row: ArrayView1<f32>, mixtures: usize) -> f64 {
        let weights = row.slice(ndarray::s![..mixtures]);
        let component = match self.mode {
            DecodeMode::Greedy => argmax(weights.iter().map(|&w| w as f64)),
            DecodeMode::Sample => {
                let noisy: Vec<f64> = weights
                    .iter()
                    .map(|&w| w as f64 - (-self.uniform().ln()).ln())
                    .collect();
                argmax(noisy.into_iter())
            }
        };
        let mean = row[mixtures + component] as f64;
        let log_scale = (row[2 * mixtures + component] as f64).max(LOG_SCALE_MIN);

        let x = match self.mode {
            DecodeMode::Greedy => mean,
            DecodeMode::Sample => {
                let u = self.uniform();
                mean + log_scale.exp() * (u.ln() - (1.0 - u).ln())
            }
        };
        quantize(x.clamp(-1.0, 1.0), self.bits)
    }
}

impl SampleDecoder for MixtureOfLogistics {
    fn decode(&mut self, logits: ArrayView2<f32>) -> Result<Vec<f32>> {
        let cols = logits.ncols();
        if cols == 0 || cols % 3 != 0 {
            return Err(VocoderError::shape(
                "logits",
                "a multiple of 3 mixture parameters",
                logits.shape(),
            ));
        }
        let mixtures = cols / 3;
        Ok(logits
            .outer_iter()
            .map(|row| self.decode_row(row, mixtures) as f32)
            .collect())
    }
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_greedy_picks_strongest_component() {
        let mut dec = MixtureOfLogistics::greedy(16);
        // two components: weights, means, log scales
        let logits = array![[0.0f32, 5.0, -0.5, 0.25, -7.0, -7.0], [3.0, 1.0, 0.75, 0.1, -7.0, -7.0]];
        let out = dec.decode(logits.view()).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.25).abs() < 1e-4);
        assert!((out[1] - 0.75).abs() < 1e-4);
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut dec = MixtureOfLogistics::new(DecodeMode::Sample, 9, Some(7));
        let logits = Array2::from_shape_fn((64, 9), |(r, c)| match c / 3 {
            0 => (r % 3) as f32,
            1 => if c % 2 == 0 { 3.0 } else { -3.0 },
            _ => 2.0,
        });
        for _ in 0..10 {
            let out = dec.decode(logits.view()).unwrap();
            assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_sample_mode_draws_near_dominant_mean() {
        let mut dec = MixtureOfLogistics::new(DecodeMode::Sample, 16, Some(3));
        let logits = Array2::from_shape_fn((32, 6), |(_, c)| [20.0f32, -20.0, 0.3, -0.7, -20.0, -20.0][c]);
        let out = dec.decode(logits.view()).unwrap();
        for v in out {
            assert!((v - 0.3).abs() < 1e-3, "drew {}", v);
        }
    }

    #[test]
    fn test_sample_mode_visits_both_components() {
        let mut dec = MixtureOfLogistics::new(DecodeMode::Sample, 16, Some(42));
        let logits = Array2::from_shape_fn((200, 6), |(_, c)| [0.0f32, 0.0, 0.5, -0.5, -20.0, -20.0][c]);
        let out = dec.decode(logits.view()).unwrap();
        assert!(out.iter().all(|v| (v.abs() - 0.5).abs() < 1e-3));
        let positive = out.iter().filter(|&&v| v > 0.0).count();
        assert!(positive > 0 && positive < out.len(), "{} of {} positive", positive, out.len());
    }

    #[test]
    fn test_seeded_decoding_is_reproducible() {
        let logits = Array2::from_shape_fn((8, 30), |(r, c)| ((r * 31 + c * 7) % 11) as f32 / 10.0 - 0.5);
        let mut a = MixtureOfLogistics::new(DecodeMode::Sample, 9, Some(42));
        let mut b = MixtureOfLogistics::new(DecodeMode::Sample, 9, Some(42));
        assert_eq!(a.decode(logits.view()).unwrap(), b.decode(logits.view()).unwrap());
    }

    #[test]
    fn test_rejects_bad_layout() {
        let mut dec = MixtureOfLogistics::greedy(9);
        let logits = Array2::<f32>::zeros((2, 4));
        assert!(matches!(dec.decode(logits.view()), Err(VocoderError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_decode_mode_parse() {
        assert_eq!("greedy".parse::<DecodeMode>().unwrap(), DecodeMode::Greedy);
        assert_eq!("Sample".parse::<DecodeMode>().unwrap(), DecodeMode::Sample);
        assert!("beam".parse::<DecodeMode>().is_err());
    }
}
