// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use event_relay::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery failed permanently, pipeline stopped")]
    DeliveryFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::from(ConfigError::Missing("RELAY_SOURCE_ID"));
        assert!(err.to_string().starts_with("Configuration error:"));
        assert!(err.to_string().contains("RELAY_SOURCE_ID"));

        let err = AgentError::DeliveryFailed;
        assert_eq!(
            err.to_string(),
            "Delivery failed permanently, pipeline stopped"
        );
    }
}
