// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented event source reading from stdin.
//!
//! The reader runs on a dedicated OS thread because stdin reads block. While
//! capture is paused the thread parks on a gate and stops draining its input,
//! so the writer on the other end of the pipe is slowed down by the OS.

use event_relay::{CaptureControl, TimeWindowBatcher, Unit};
use std::io::BufRead;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    fn update(&self, f: impl FnOnce(&mut GateState)) {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("lock poisoned");
        f(&mut state);
        self.changed.notify_all();
    }

    /// Blocks until the gate opens. Returns `false` once closed for good.
    fn wait_open(&self) -> bool {
        #[allow(clippy::expect_used)]
        let state = self.state.lock().expect("lock poisoned");
        #[allow(clippy::expect_used)]
        let state = self
            .changed
            .wait_while(state, |s| !s.open && !s.closed)
            .expect("lock poisoned");
        !state.closed
    }
}

/// Capture switch for the stdin reader. Starts paused.
#[derive(Debug, Clone, Default)]
pub struct StdinCapture {
    gate: Arc<Gate>,
}

impl StdinCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the reader thread for good.
    pub fn close(&self) {
        self.gate.update(|s| s.closed = true);
    }

    /// Spawns the reader thread. `eof` is cancelled when the input ends.
    pub fn spawn_reader<R>(
        &self,
        mut reader: R,
        batcher: Arc<TimeWindowBatcher>,
        eof: CancellationToken,
    ) -> std::io::Result<JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let mut buf = Vec::new();
                let mut total = 0usize;
                while gate.wait_open() {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => {
                            info!("End of input after {total} units");
                            break;
                        }
                        Ok(_) => {
                            for unit in decode_units(&buf) {
                                batcher.add(unit);
                                total += 1;
                            }
                        }
                        Err(e) => {
                            error!("Failed to read input: {e}");
                            break;
                        }
                    }
                }
                debug!("Input reader exited");
                eof.cancel();
            })
    }
}

impl CaptureControl for StdinCapture {
    fn start(&self) {
        debug!("Resuming input capture");
        self.gate.update(|s| s.open = true);
    }

    fn stop(&self) {
        debug!("Pausing input capture");
        self.gate.update(|s| s.open = false);
    }
}

/// Invalid UTF-8 sequences become [`Unit::Unknown`].
fn decode_units(bytes: &[u8]) -> Vec<Unit> {
    String::from_utf8_lossy(bytes)
        .chars()
        .map(|c| match c {
            char::REPLACEMENT_CHARACTER => Unit::Unknown,
            c => Unit::from(c),
        })
        .collect()
}
