// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic drain-encode-send cycle and the capture-control state machine.
//!
//! ```text
//!   producer ──add──> TimeWindowBatcher
//!                          │ pop_ready (every tick)
//!                          v
//!                     ByteTransform
//!                          │
//!                          v
//!                     DeliverySink ──outcome──> CaptureControl start/stop
//! ```
//!
//! | outcome   | capturing | effect                              |
//! |-----------|-----------|-------------------------------------|
//! | Delivered | false     | resume capture                      |
//! | Degraded  | true      | pause capture                       |
//! | Fatal     | any       | shut the pipeline down, final flush |
//!
//! Retries belong to the sink, so the tick cadence does not depend on
//! backoff timing.

use crate::batcher::TimeWindowBatcher;
use crate::capture::CaptureControl;
use crate::error::ConfigError;
use crate::sink::{DeliveryOutcome, DeliverySink};
use crate::transform::ByteTransform;
use crate::unit::Batch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct OrchestratorConfig {
    pub batcher: Arc<TimeWindowBatcher>,
    pub transform: Arc<dyn ByteTransform>,
    pub sink: Arc<dyn DeliverySink>,
    pub capture: Arc<dyn CaptureControl>,
    pub tick_interval: Duration,
}

pub struct DeliveryOrchestrator {
    batcher: Arc<TimeWindowBatcher>,
    transform: Arc<dyn ByteTransform>,
    sink: Arc<dyn DeliverySink>,
    capture: Arc<dyn CaptureControl>,
    tick_interval: Duration,
    running: AtomicBool,
    // Held for the whole tick, so ticks never overlap and shutdown waits for
    // the one in flight.
    capturing: TokioMutex<bool>,
    cancel: CancellationToken,
    // Cancelled once the final flush is over.
    finished: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Result<Arc<Self>, ConfigError> {
        if config.tick_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "delivery tick must be greater than zero".to_string(),
            ));
        }
        Ok(Arc::new(DeliveryOrchestrator {
            batcher: config.batcher,
            transform: config.transform,
            sink: config.sink,
            capture: config.capture,
            tick_interval: config.tick_interval,
            running: AtomicBool::new(true),
            capturing: TokioMutex::new(true),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            worker: Mutex::new(None),
        }))
    }

    pub fn batcher(&self) -> &Arc<TimeWindowBatcher> {
        &self.batcher
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Waits for any in-flight tick.
    pub async fn is_capturing(&self) -> bool {
        *self.capturing.lock().await
    }

    /// Resolves once shutdown has begun, either through [`Self::stop`] or
    /// because the sink reported a fatal outcome.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Starts the event source and the periodic delivery worker.
    ///
    /// Calling it again, or after the orchestrator stopped, does nothing.
    pub fn start(self: &Arc<Self>) {
        #[allow(clippy::expect_used)]
        let mut worker = self.worker.lock().expect("lock poisoned");
        if worker.is_some() || !self.is_running() {
            debug!("Delivery worker already started or stopped, ignoring start");
            return;
        }

        info!(
            "Starting delivery worker, ticking every {} ms over {} ms windows",
            self.tick_interval.as_millis(),
            self.batcher.interval().as_millis()
        );
        self.capture.start();
        let this = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { this.run().await }));
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        debug!("Delivery worker exited");
    }

    /// Runs one drain-encode-send cycle.
    ///
    /// Returns `None` when nothing was sent: the orchestrator is stopped, or
    /// capture is running and no batch has closed yet. While capture is
    /// paused an empty drain still sends an empty payload, which probes the
    /// sink so capture can resume once it recovers.
    pub async fn tick(&self) -> Option<DeliveryOutcome> {
        let mut capturing = self.capturing.lock().await;
        if !self.is_running() {
            return None;
        }

        let ready = self.batcher.pop_ready();
        if ready.is_empty() && *capturing {
            return None;
        }

        let outcome = self.deliver(ready).await;
        match outcome {
            DeliveryOutcome::Delivered if !*capturing => {
                info!("Delivery recovered, resuming capture");
                *capturing = true;
                self.capture.start();
            }
            DeliveryOutcome::Degraded if *capturing => {
                warn!("Delivery degraded, pausing capture");
                *capturing = false;
                self.capture.stop();
            }
            DeliveryOutcome::Fatal => {
                error!("Delivery failed permanently, stopping pipeline");
                *capturing = false;
                if self.begin_shutdown() {
                    self.flush_remaining().await;
                    self.finished.cancel();
                }
            }
            _ => {}
        }
        Some(outcome)
    }

    /// Stops capture and the worker, then sends whatever is left in the
    /// batcher one last time.
    ///
    /// Idempotent. Waits for an in-flight tick to finish; a send in progress
    /// is never cancelled. Every caller, including overlapping ones, returns
    /// only once the final flush is over. Must not be awaited from inside a
    /// sink or capture callback, since it joins the worker running them.
    pub async fn stop(&self) {
        let initiated = self.begin_shutdown();

        #[allow(clippy::expect_used)]
        let worker = self.worker.lock().expect("lock poisoned").take();
        let mut worker_failed = false;
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Delivery worker failed: {e}");
                worker_failed = true;
            }
        }

        if initiated {
            let mut capturing = self.capturing.lock().await;
            *capturing = false;
            self.flush_remaining().await;
            self.finished.cancel();
        } else if !worker_failed {
            // A worker that died mid-flush never cancels `finished`.
            self.finished.cancelled().await;
        }
    }

    /// Flips `running` off. Only the caller that wins the flip gets `true`
    /// and owns the final flush.
    fn begin_shutdown(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        info!("Stopping delivery orchestrator");
        self.capture.stop();
        self.cancel.cancel();
        true
    }

    async fn flush_remaining(&self) -> Option<DeliveryOutcome> {
        let remaining = self.batcher.flush();
        if remaining.is_empty() {
            debug!("Nothing left to flush");
            return None;
        }
        // Capture is already stopping; this outcome changes nothing.
        let outcome = self.deliver(remaining).await;
        info!("Final flush finished: {outcome}");
        Some(outcome)
    }

    async fn deliver(&self, batches: Vec<Batch>) -> DeliveryOutcome {
        let n_batches = batches.len();
        let n_units: usize = batches.iter().map(Batch::len).sum();
        debug!("Sending {n_batches} batches ({n_units} units)");

        let encoded = self.transform.encode_all(batches);
        let outcome = self.sink.send(&encoded).await;

        if outcome != DeliveryOutcome::Delivered && n_batches > 0 {
            warn!("Dropped {n_batches} batches ({n_units} units) after {outcome} delivery");
        }
        outcome
    }
}
