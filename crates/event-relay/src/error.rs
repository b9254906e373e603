// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while building the pipeline from configuration.
///
/// All of these are fatal at startup and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid interval unit '{0}'. Choose from 'seconds', 'minutes', 'hours', 'days'")]
    InvalidUnit(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid transform key: {0}")]
    InvalidKey(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Failure of a single delivery attempt, before it is reduced to a
/// [`crate::sink::DeliveryOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Network trouble, rate limiting or a retryable server status.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Malformed payload or a client error the collector will never accept.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}
