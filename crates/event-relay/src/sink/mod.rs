// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destinations for encoded batches.
//!
//! A sink owns its retry policy and reduces whatever its transport reports to
//! a [`DeliveryOutcome`]. Ordinary transport failures are classified, never
//! propagated. Nothing is persisted locally when delivery fails: batches
//! whose send ends `Degraded` or `Fatal` are dropped by the caller.

pub mod file;
pub mod http;

use crate::transform::EncodedBatch;
use async_trait::async_trait;
use std::fmt;

pub use file::FileSink;
pub use http::{HttpSink, HttpSinkConfig, RetryPolicy, SOURCE_ID_HEADER};

/// Normalized result of one `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    /// The destination acknowledged the payload.
    Delivered,
    /// Recoverable trouble; retries were exhausted or the destination asked
    /// us to slow down.
    Degraded,
    /// The destination will never accept what we send; the session ends.
    Fatal,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Degraded => write!(f, "degraded"),
            DeliveryOutcome::Fatal => write!(f, "fatal"),
        }
    }
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Attempts to deliver every batch in `payload` as a single unit.
    async fn send(&self, payload: &[EncodedBatch]) -> DeliveryOutcome;
}
