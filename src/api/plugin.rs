use crate::api::config::VocoderConfig;
use crate::vocoder::executor::{BatchSizeTable, ModelExecutor};
use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
}

/// A model backend: owns loading, device selection and weights, and hands
/// out ready-to-run executors.
pub trait BackendPlugin: Send + Sync {
    fn metadata(&self) -> BackendMetadata;
    fn on_load(&mut self) -> anyhow::Result<()> { Ok(()) }

    /// Executor for the upsampling network (`mels` -> `upsample_mels`, `aux`).
    fn conditioning(&mut self) -> anyhow::Result<Box<dyn ModelExecutor>>;

    /// Executor for one recurrent step, built for exactly `batch_size` rows.
    fn recurrent(&mut self, batch_size: usize) -> anyhow::Result<Box<dyn ModelExecutor>>;
}

/// Resolves the conditioning executor and one recurrent executor per
/// configured batch size.
pub fn build_executors(
    plugin: &mut dyn BackendPlugin,
    config: &VocoderConfig,
) -> anyhow::Result<(Box<dyn ModelExecutor>, BatchSizeTable)> {
    let meta = plugin.metadata();
    info!("Preparing executors from backend {} v{}", meta.name, meta.version);

    let conditioning = plugin
        .conditioning()
        .context("Backend failed to provide the conditioning executor")?;
    let mut entries = Vec::with_capacity(config.batch_sizes.len());
    for &size in &config.batch_sizes {
        debug!("Building recurrent executor for batch size {}", size);
        let exec = plugin
            .recurrent(size)
            .with_context(|| format!("Backend failed to provide batch size {}", size))?;
        entries.push((size, exec));
    }
    let table = BatchSizeTable::new(entries)?;
    Ok((conditioning, table))
}

pub struct BackendLoader {
    // Dropped before the library that owns its code.
    plugin: Box<dyn BackendPlugin>,
    _lib: libloading::Library,
}

impl BackendLoader {
    pub unsafe fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let lib = libloading::Library::new(path.as_ref())?;

        let constructor: libloading::Symbol<fn() -> Box<dyn BackendPlugin>> =
            lib.get(b"_mel2wave_backend_create")?;

        let mut plugin = constructor();
        plugin.on_load()?;

        Ok(Self {
            plugin,
            _lib: lib,
        })
    }

    pub fn plugin(&mut self) -> &mut dyn BackendPlugin {
        self.plugin.as_mut()
    }
}
