// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use crate::unit::{Batch, Unit};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Groups incoming units into successive fixed-length time windows.
///
/// The last batch in the container is the open one; every earlier batch is
/// closed and ready to be drained. The lock is only held for appends and
/// swaps of the backing vector, never across I/O.
#[derive(Debug)]
pub struct TimeWindowBatcher {
    interval: Duration,
    batches: Mutex<Vec<Batch>>,
}

impl TimeWindowBatcher {
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "batch window must be greater than zero".to_string(),
            ));
        }
        Ok(TimeWindowBatcher {
            interval,
            batches: Mutex::new(Vec::with_capacity(4)),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Appends a unit that arrived now.
    pub fn add(&self, unit: Unit) {
        self.add_at(unit, SystemTime::now());
    }

    /// Appends a unit that arrived at `now`.
    ///
    /// Opens a new batch when there is none or when the open window has
    /// elapsed. A `now` earlier than the open window's start keeps the unit
    /// in the open window.
    pub fn add_at(&self, unit: Unit, now: SystemTime) {
        #[allow(clippy::expect_used)]
        let mut batches = self.batches.lock().expect("lock poisoned");

        let window_elapsed = match batches.last() {
            None => true,
            Some(open) => now
                .duration_since(open.window_start)
                .map_or(false, |elapsed| elapsed >= self.interval),
        };

        if window_elapsed {
            batches.push(Batch::new(now));
        }

        if let Some(open) = batches.last_mut() {
            open.units.push(unit);
        }
    }

    /// Takes every closed batch, leaving only the open one behind.
    ///
    /// With zero or one batch in the container nothing is closed, so an empty
    /// vector is returned and the container is left untouched.
    pub fn pop_ready(&self) -> Vec<Batch> {
        #[allow(clippy::expect_used)]
        let mut batches = self.batches.lock().expect("lock poisoned");

        if batches.len() <= 1 {
            return Vec::new();
        }
        let Some(open) = batches.pop() else {
            return Vec::new();
        };
        std::mem::replace(&mut *batches, vec![open])
    }

    /// Takes every batch including the open one. Only meant for shutdown,
    /// once no more units will be added.
    pub fn flush(&self) -> Vec<Batch> {
        #[allow(clippy::expect_used)]
        let mut batches = self.batches.lock().expect("lock poisoned");
        std::mem::take(&mut *batches)
    }

    /// Number of batches held, the open one included.
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.batches.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
