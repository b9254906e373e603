// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time-windowed event batching with resilient delivery.
//!
//! Events are grouped into fixed-length windows by [`batcher`], encoded by a
//! reversible [`transform`], and shipped by a [`sink`] on every tick of the
//! [`orchestrator`]. Delivery outcomes drive the [`capture`] switch, which
//! pauses the event source while the destination struggles.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batcher;
pub mod capture;
pub mod config;
pub mod error;
pub mod http_utils;
pub mod orchestrator;
pub mod sink;
pub mod transform;
pub mod unit;

pub use batcher::TimeWindowBatcher;
pub use capture::{CaptureControl, NoopCapture};
pub use config::{RelayConfig, SinkConfig, TransformConfig};
pub use error::{ConfigError, DeliveryError};
pub use orchestrator::{DeliveryOrchestrator, OrchestratorConfig};
pub use sink::{DeliveryOutcome, DeliverySink, FileSink, HttpSink, HttpSinkConfig, RetryPolicy};
pub use transform::{ByteTransform, EncodedBatch, IdentityTransform, XorTransform};
pub use unit::{Batch, Special, Unit};
