use crate::error::{Result, VocoderError};
use log::debug;
use ndarray::{ArrayD, Dimension, Array};
use std::collections::{BTreeMap, HashMap};

/// Named tensors exchanged with a model executor.
pub type TensorMap = HashMap<String, ArrayD<f32>>;

/// Opaque network runner. Implementations are loaded by a backend and
/// treated as deterministic functions of their inputs.
pub trait ModelExecutor: Send + Sync {
    /// Declared shape of an input tensor, if the network has one by that name.
    fn input_shape(&self, name: &str) -> Option<Vec<usize>>;

    fn infer(&self, inputs: TensorMap) -> anyhow::Result<TensorMap>;
}

pub const DEFAULT_BATCH_SIZES: [usize; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

/// Recurrent-step executors keyed by the exact batch size they were built for.
pub struct BatchSizeTable {
    executors: BTreeMap<usize, Box<dyn ModelExecutor>>,
}

impl BatchSizeTable {
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, Box<dyn ModelExecutor>)>,
    {
        let mut executors = BTreeMap::new();
        for (size, exec) in entries {
            if !size.is_power_of_two() {
                return Err(VocoderError::InvalidConfig(format!(
                    "batch size {} is not a power of two",
                    size
                )));
            }
            executors.insert(size, exec);
        }
        if executors.is_empty() {
            return Err(VocoderError::InvalidConfig("batch size table is empty".into()));
        }
        Ok(Self { executors })
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.executors.keys().copied().collect()
    }

    pub fn contains(&self, batch: usize) -> bool {
        self.executors.contains_key(&batch)
    }

    pub fn get(&self, batch: usize) -> Result<&dyn ModelExecutor> {
        match self.executors.get(&batch) {
            Some(exec) => {
                debug!("Selected recurrent executor for batch size {}", batch);
                Ok(exec.as_ref())
            }
            None => Err(VocoderError::InvalidBatchSize {
                batch,
                supported: self.sizes(),
            }),
        }
    }

    /// Declared input shape reported by the first executor that knows `name`.
    pub fn input_shape(&self, name: &str) -> Option<Vec<usize>> {
        self.executors.values().find_map(|e| e.input_shape(name))
    }
}

/// Removes a named output and converts it to the expected rank.
pub fn take_output<D: Dimension>(outputs: &mut TensorMap, name: &str) -> Result<Array<f32, D>> {
    let tensor = outputs
        .remove(name)
        .ok_or_else(|| VocoderError::shape(name, "an output tensor", &[]))?;
    let shape = tensor.shape().to_vec();
    tensor
        .into_dimensionality::<D>()
        .map_err(|_| VocoderError::shape(name, format!("rank {}", D::NDIM.unwrap_or(0)), &shape))
}
