// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Start/stop switch for the upstream event source.
///
/// Both operations must be idempotent. The orchestrator is the only caller.
pub trait CaptureControl: Send + Sync {
    fn start(&self);

    fn stop(&self);
}

/// For sources that cannot be paused.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCapture;

impl CaptureControl for NoopCapture {
    fn start(&self) {}

    fn stop(&self) {}
}
