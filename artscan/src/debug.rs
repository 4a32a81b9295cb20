//! Debug image sink.
//!
//! Intermediate buffers are collected through an explicit sink passed into
//! each stage (`Option<&mut DebugSink>`); there is no implicit global state.
//! The sink is rendered for visual inspection only and is never consumed by
//! another pipeline component.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::buffer::PixelBuffer;

#[derive(Debug, Default, Clone)]
pub struct DebugSink {
    images: BTreeMap<String, PixelBuffer>,
}

impl DebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, buffer: &PixelBuffer) {
        self.images.insert(name.into(), buffer.clone());
    }

    pub fn get(&self, name: &str) -> Option<&PixelBuffer> {
        self.images.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// Write every recorded buffer as `<dir>/<name>.png`.
    pub fn dump_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create debug dir {}", dir.display()))?;
        for (name, buffer) in &self.images {
            let safe: String = name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            let path = dir.join(format!("{safe}.png"));
            let bytes = buffer.to_png_bytes()?;
            std::fs::write(&path, bytes)
                .with_context(|| format!("write debug image {}", path.display()))?;
        }
        Ok(())
    }
}

/// Record into the sink when one is attached.
pub(crate) fn record(sink: &mut Option<&mut DebugSink>, name: &str, buffer: &PixelBuffer) {
    if let Some(sink) = sink {
        sink.record(name, buffer);
    }
}
