// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock sinks and capture switches for testing

use async_trait::async_trait;
use event_relay::capture::CaptureControl;
use event_relay::sink::{DeliveryOutcome, DeliverySink};
use event_relay::transform::EncodedBatch;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Sink that answers from a script, then falls back to a default outcome.
pub struct ScriptedSink {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    default: DeliveryOutcome,
    payloads: Mutex<Vec<Vec<EncodedBatch>>>,
}

impl ScriptedSink {
    pub fn new(script: Vec<DeliveryOutcome>, default: DeliveryOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: DeliveryOutcome) -> Self {
        Self::new(Vec::new(), outcome)
    }

    pub fn payloads(&self) -> Vec<Vec<EncodedBatch>> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliverySink for ScriptedSink {
    async fn send(&self, payload: &[EncodedBatch]) -> DeliveryOutcome {
        self.payloads.lock().unwrap().push(payload.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default)
    }
}

#[derive(Default)]
pub struct CountingCapture {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingCapture {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl CaptureControl for CountingCapture {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink whose every send takes `delay`; tracks how many sends overlap.
pub struct SlowSink {
    delay: Duration,
    calls: AtomicUsize,
    done: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliverySink for SlowSink {
    async fn send(&self, _payload: &[EncodedBatch]) -> DeliveryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.done.fetch_add(1, Ordering::SeqCst);
        DeliveryOutcome::Delivered
    }
}
