use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use log::info;

use crate::models::TipEvent;

/// Append-only sink: one JSON object per line, flushed per event. Carries no
/// session bookkeeping at all.
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open output file {}", path.display()))?;

        info!("Appending tip events to {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn append(&self, event: &TipEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("failed to serialize tip event")?;
        let mut writer = self.writer.lock().expect("jsonl writer poisoned");
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to append to {}", self.path.display()))
    }

    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().expect("jsonl writer poisoned");
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }
}
