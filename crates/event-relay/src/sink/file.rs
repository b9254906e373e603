// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sink::{DeliveryOutcome, DeliverySink};
use crate::transform::EncodedBatch;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Appends each batch as one JSON line (`[window_start, [code, ...]]`) to a
/// local file. Writes run on the blocking thread pool.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    // serializes writers so lines from concurrent sends never interleave
    write_lock: Arc<Mutex<()>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append(path: &Path, write_lock: &Mutex<()>, lines: &[u8]) -> std::io::Result<()> {
    #[allow(clippy::expect_used)]
    let _guard = write_lock.lock().expect("lock poisoned");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(lines)?;
    file.flush()
}

fn to_lines(payload: &[EncodedBatch]) -> serde_json::Result<Vec<u8>> {
    let mut lines = Vec::new();
    for batch in payload {
        serde_json::to_writer(&mut lines, batch)?;
        lines.push(b'\n');
    }
    Ok(lines)
}

#[async_trait]
impl DeliverySink for FileSink {
    async fn send(&self, payload: &[EncodedBatch]) -> DeliveryOutcome {
        let lines = match to_lines(payload) {
            Ok(lines) => lines,
            Err(e) => {
                error!("FILE_SINK | Failed to serialize payload. Data dropped: {e}");
                return DeliveryOutcome::Fatal;
            }
        };

        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let result =
            tokio::task::spawn_blocking(move || append(&path, &write_lock, &lines)).await;

        match result {
            Ok(Ok(())) => {
                debug!(
                    "FILE_SINK | Wrote {} batches to {}",
                    payload.len(),
                    self.path.display()
                );
                DeliveryOutcome::Delivered
            }
            Ok(Err(e)) => {
                warn!("FILE_SINK | Failed to write {}: {e}", self.path.display());
                DeliveryOutcome::Degraded
            }
            Err(e) => {
                error!("FILE_SINK | Write task failed: {e}");
                DeliveryOutcome::Degraded
            }
        }
    }
}
