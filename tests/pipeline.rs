use mel2wave::api::VocoderConfig;
use mel2wave::vocoder::executor::{BatchSizeTable, ModelExecutor, TensorMap, DEFAULT_BATCH_SIZES};
use mel2wave::vocoder::mol::MixtureOfLogistics;
use mel2wave::{VocoderError, WaveRnn};
use ndarray::{Array3, ArrayD};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const MEL_LEN: usize = 100;
const MEL_BINS: usize = 80;
const HOP: usize = 275;
const PAD: usize = 2;
const INDENT: usize = 550;
const RNN_WIDTH: usize = 4;

/// Upsampling stand-in: every input frame becomes `HOP` samples carrying the
/// frame's first mel bin.
struct Upsampler {
    calls: Arc<AtomicUsize>,
}

impl ModelExecutor for Upsampler {
    fn input_shape(&self, name: &str) -> Option<Vec<usize>> {
        (name == "mels").then(|| vec![1, MEL_LEN + 2 * PAD, MEL_BINS])
    }

    fn infer(&self, mut inputs: TensorMap) -> anyhow::Result<TensorMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mels = inputs
            .remove("mels")
            .ok_or_else(|| anyhow::anyhow!("missing mels"))?;
        assert_eq!(mels.shape(), &[1, MEL_LEN + 2 * PAD, MEL_BINS]);
        let samples = (MEL_LEN + 2 * PAD) * HOP;
        let up = ArrayD::from_shape_fn(vec![1, samples, 2], |i| mels[&[0, i[1] / HOP, 0][..]]);
        let aux = ArrayD::zeros(vec![1, samples - 2 * INDENT, 8]);
        Ok(TensorMap::from([
            ("upsample_mels".to_string(), up),
            ("aux".to_string(), aux),
        ]))
    }
}

/// Recurrent stand-in whose single mixture component is centred on `m_t[:, 0]`.
struct Follower {
    batch: usize,
    calls: Arc<AtomicUsize>,
}

impl ModelExecutor for Follower {
    fn input_shape(&self, name: &str) -> Option<Vec<usize>> {
        match name {
            "h1" | "h2" => Some(vec![self.batch, RNN_WIDTH]),
            "x" => Some(vec![self.batch, 1]),
            _ => None,
        }
    }

    fn infer(&self, mut inputs: TensorMap) -> anyhow::Result<TensorMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let m = inputs.remove("m_t").ok_or_else(|| anyhow::anyhow!("missing m_t"))?;
        assert_eq!(m.shape()[0], self.batch);
        let logits = ArrayD::from_shape_fn(vec![self.batch, 3], |i| match i[1] {
            0 => 0.0,
            1 => m[&[i[0], 0][..]],
            _ => -30.0,
        });
        let h1 = inputs.remove("h1").ok_or_else(|| anyhow::anyhow!("missing h1"))?;
        let h2 = inputs.remove("h2").ok_or_else(|| anyhow::anyhow!("missing h2"))?;
        Ok(TensorMap::from([
            ("logits".to_string(), logits),
            ("h1".to_string(), h1),
            ("h2".to_string(), h2),
        ]))
    }
}

struct Harness {
    vocoder: WaveRnn,
    upsample_calls: Arc<AtomicUsize>,
    step_calls: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let upsample_calls = Arc::new(AtomicUsize::new(0));
    let step_calls = Arc::new(AtomicUsize::new(0));
    let table = BatchSizeTable::new(DEFAULT_BATCH_SIZES.iter().map(|&b| {
        let exec: Box<dyn ModelExecutor> = Box::new(Follower {
            batch: b,
            calls: step_calls.clone(),
        });
        (b, exec)
    }))
    .unwrap();
    let conditioning = Box::new(Upsampler {
        calls: upsample_calls.clone(),
    });
    let vocoder = WaveRnn::new(conditioning, table, VocoderConfig::default()).unwrap();
    Harness {
        vocoder,
        upsample_calls,
        step_calls,
    }
}

fn frame_value(t: usize) -> f32 {
    (t % 50) as f32 / 100.0 - 0.25
}

fn mel(frames: usize) -> Array3<f32> {
    Array3::from_shape_fn((1, frames, MEL_BINS), |(_, t, _)| frame_value(t))
}

#[test]
fn test_resolves_declared_shapes() {
    let h = harness();
    assert_eq!(h.vocoder.mel_len, MEL_LEN);
    assert_eq!(h.vocoder.mel_bins, MEL_BINS);
    assert_eq!(h.vocoder.rnn_width, RNN_WIDTH);
}

#[test]
fn test_two_fold_synthesis() {
    let h = harness();
    let frames = 80;
    let mut decoder = MixtureOfLogistics::greedy(16);
    let wave = h.vocoder.forward(mel(frames).view(), &mut decoder).unwrap();

    assert_eq!(wave.len(), (frames - 1) * HOP);
    assert_eq!(h.upsample_calls.load(Ordering::SeqCst), 1);
    // 80 * 275 samples fold into two windows of 11000 + 2 * 550 steps.
    assert_eq!(h.step_calls.load(Ordering::SeqCst), 12100);

    let fade_len = 20 * HOP;
    let body = wave.len() - fade_len;
    for (n, &v) in wave[..body].iter().enumerate() {
        let expected = frame_value(n / HOP) as f64;
        assert!((v - expected).abs() < 1e-3, "sample {}: {} vs {}", n, v, expected);
    }
    for (j, &v) in wave[body..].iter().enumerate() {
        let n = body + j;
        let gain = 1.0 - j as f64 / (fade_len - 1) as f64;
        let expected = frame_value(n / HOP) as f64 * gain;
        assert!((v - expected).abs() < 1e-3, "faded sample {}: {} vs {}", n, v, expected);
    }
}

#[test]
fn test_unsupported_fold_count_is_rejected() {
    // 100 frames -> 27500 samples -> ceil(27500 / 11000) = 3 folds.
    let h = harness();
    let mut decoder = MixtureOfLogistics::greedy(9);
    let err = h.vocoder.forward(mel(100).view(), &mut decoder).unwrap_err();
    assert!(matches!(err, VocoderError::InvalidBatchSize { batch: 3, .. }));
    assert_eq!(h.step_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_chunk_padding_is_trimmed() {
    use mel2wave::vocoder::conditioning::ConditioningStage;

    let calls = Arc::new(AtomicUsize::new(0));
    let up = Upsampler { calls: calls.clone() };
    let stage = ConditioningStage::new(&up, PAD, INDENT, HOP).unwrap();
    let out = stage.forward(mel(250).view()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 300 * 275 produced, 50 * 275 = 13750 padded samples trimmed.
    assert_eq!(out.upsampled.nrows(), 250 * HOP);
    assert_eq!(out.aux.nrows(), 250 * HOP);
    assert_eq!(out.upsampled[[250 * HOP - 1, 0]], frame_value(249));
}

#[test]
fn test_single_fold_synthesis() {
    // 40 * 275 = 11000 samples: exactly one target-length fold.
    let h = harness();
    let mut decoder = MixtureOfLogistics::greedy(16);
    let wave = h.vocoder.forward(mel(40).view(), &mut decoder).unwrap();
    assert_eq!(wave.len(), 39 * HOP);
    assert_eq!(h.step_calls.load(Ordering::SeqCst), 12100);
    assert!((wave[0] - frame_value(0) as f64).abs() < 1e-3);
    assert!(wave.last().unwrap().abs() < 1e-9);
}

#[test]
fn test_empty_mel() {
    let h = harness();
    let mut decoder = MixtureOfLogistics::greedy(9);
    let err = h.vocoder.forward(mel(0).view(), &mut decoder).unwrap_err();
    assert!(matches!(err, VocoderError::EmptyMel));
    assert_eq!(h.upsample_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_executor_failure_propagates() {
    struct Broken;

    impl ModelExecutor for Broken {
        fn input_shape(&self, name: &str) -> Option<Vec<usize>> {
            (name == "mels").then(|| vec![1, MEL_LEN + 2 * PAD, MEL_BINS])
        }

        fn infer(&self, _inputs: TensorMap) -> anyhow::Result<TensorMap> {
            anyhow::bail!("device lost")
        }
    }

    let steps = Arc::new(AtomicUsize::new(0));
    let table = BatchSizeTable::new([(
        1,
        Box::new(Follower { batch: 1, calls: steps }) as Box<dyn ModelExecutor>,
    )])
    .unwrap();
    let config = VocoderConfig {
        batch_sizes: vec![1],
        ..Default::default()
    };
    let vocoder = WaveRnn::new(Box::new(Broken), table, config).unwrap();
    let mut decoder = MixtureOfLogistics::greedy(9);
    let err = vocoder.forward(mel(10).view(), &mut decoder).unwrap_err();
    assert!(matches!(err, VocoderError::Executor(_)));
    assert_eq!(err.to_string(), "device lost");
}
