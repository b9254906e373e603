// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration read from `RELAY_*` environment variables.

use crate::batcher::TimeWindowBatcher;
use crate::error::ConfigError;
use crate::sink::{DeliverySink, FileSink, HttpSink, HttpSinkConfig, RetryPolicy};
use crate::transform::{ByteTransform, IdentityTransform, XorTransform};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/update";
const DEFAULT_OUTPUT_PATH: &str = "relay.jsonl";
const DEFAULT_XOR_KEY: u8 = 7;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub const fn seconds(self) -> u64 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3_600,
            IntervalUnit::Days => 86_400,
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "second" | "seconds" => Ok(IntervalUnit::Seconds),
            "minute" | "minutes" => Ok(IntervalUnit::Minutes),
            "hour" | "hours" => Ok(IntervalUnit::Hours),
            "day" | "days" => Ok(IntervalUnit::Days),
            _ => Err(ConfigError::InvalidUnit(s.to_string())),
        }
    }
}

/// Converts `value` `unit`s to a duration. The result must be positive.
pub fn interval(value: f64, unit: IntervalUnit) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidInterval(format!(
            "{value} must be a positive number"
        )));
    }
    Duration::try_from_secs_f64(value * unit.seconds() as f64)
        .map_err(|e| ConfigError::InvalidInterval(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformConfig {
    Xor { key: u8 },
    Identity,
}

impl TransformConfig {
    pub fn build(&self) -> Result<Arc<dyn ByteTransform>, ConfigError> {
        match self {
            TransformConfig::Xor { key } => Ok(Arc::new(XorTransform::new(*key)?)),
            TransformConfig::Identity => Ok(Arc::new(IdentityTransform)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SinkConfig {
    Http(HttpSinkConfig),
    File { path: PathBuf },
}

impl SinkConfig {
    pub fn build(&self) -> Result<Arc<dyn DeliverySink>, ConfigError> {
        match self {
            SinkConfig::Http(config) => Ok(Arc::new(HttpSink::new(config.clone())?)),
            SinkConfig::File { path } => Ok(Arc::new(FileSink::new(path.clone()))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Length of each batch window.
    pub window_interval: Duration,
    /// How often ready batches are shipped.
    pub flush_interval: Duration,
    pub transform: TransformConfig,
    pub sink: SinkConfig,
    pub log_level: String,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let window_interval = interval(
            parse_or(&lookup, "RELAY_WINDOW_INTERVAL_VALUE", 1.0)?,
            unit_or_seconds(&lookup, "RELAY_WINDOW_INTERVAL_UNIT")?,
        )?;
        let flush_interval = interval(
            parse_or(&lookup, "RELAY_FLUSH_INTERVAL_VALUE", 1.0)?,
            unit_or_seconds(&lookup, "RELAY_FLUSH_INTERVAL_UNIT")?,
        )?;

        let transform = match lookup("RELAY_TRANSFORM")
            .map(|val| val.trim().to_lowercase())
            .as_deref()
        {
            None | Some("xor") => {
                let key = match lookup("RELAY_TRANSFORM_KEY") {
                    Some(raw) => XorTransform::from_key_str(&raw)?.key(),
                    None => DEFAULT_XOR_KEY,
                };
                TransformConfig::Xor { key }
            }
            Some("none") | Some("identity") => TransformConfig::Identity,
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    kind: "transform",
                    value: other.to_string(),
                })
            }
        };

        let sink = match lookup("RELAY_SINK")
            .map(|val| val.trim().to_lowercase())
            .as_deref()
        {
            None | Some("http") => SinkConfig::Http(http_sink_config(&lookup)?),
            Some("file") => SinkConfig::File {
                path: lookup("RELAY_OUTPUT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            },
            Some(other) => {
                return Err(ConfigError::UnknownVariant {
                    kind: "sink",
                    value: other.to_string(),
                })
            }
        };

        let log_level = lookup("RELAY_LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        let config = RelayConfig {
            window_interval,
            flush_interval,
            transform,
            sink,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_interval.is_zero() || self.flush_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "intervals must be greater than zero".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                name: "RELAY_LOG_LEVEL",
                value: self.log_level.clone(),
            });
        }
        if let SinkConfig::Http(http) = &self.sink {
            if http.source_id.trim().is_empty() {
                return Err(ConfigError::Missing("RELAY_SOURCE_ID"));
            }
        }
        Ok(())
    }

    pub fn batcher(&self) -> Result<TimeWindowBatcher, ConfigError> {
        TimeWindowBatcher::new(self.window_interval)
    }
}

fn http_sink_config<F>(lookup: &F) -> Result<HttpSinkConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source_id = lookup("RELAY_SOURCE_ID")
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
        .ok_or(ConfigError::Missing("RELAY_SOURCE_ID"))?;

    let backoff_secs: f64 = parse_or(lookup, "RELAY_BACKOFF_FACTOR", 0.3)?;
    let backoff_factor =
        Duration::try_from_secs_f64(backoff_secs).map_err(|_| ConfigError::InvalidValue {
            name: "RELAY_BACKOFF_FACTOR",
            value: backoff_secs.to_string(),
        })?;

    let retry_statuses = match lookup("RELAY_RETRY_STATUSES") {
        Some(raw) => parse_statuses(&raw)?,
        None => RetryPolicy::default().retry_statuses,
    };

    let max_attempts: u32 = parse_or(lookup, "RELAY_RETRIES", 3)?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidValue {
            name: "RELAY_RETRIES",
            value: "0".to_string(),
        });
    }

    let timeout_secs: u64 = parse_or(lookup, "RELAY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
    if timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            name: "RELAY_TIMEOUT_SECS",
            value: "0".to_string(),
        });
    }

    let endpoint = lookup("RELAY_ENDPOINT")
        .map(|val| val.trim().to_string())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    match reqwest::Url::parse(&endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(ConfigError::InvalidValue {
                name: "RELAY_ENDPOINT",
                value: endpoint,
            })
        }
    }

    Ok(HttpSinkConfig {
        endpoint,
        source_id,
        timeout: Duration::from_secs(timeout_secs),
        https_proxy: lookup("RELAY_HTTPS_PROXY").or_else(|| lookup("HTTPS_PROXY")),
        retry_policy: RetryPolicy {
            max_attempts,
            backoff_factor,
            retry_statuses,
        },
    })
}

fn parse_statuses(raw: &str) -> Result<Vec<u16>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u16>() {
            Ok(code) if (100..600).contains(&code) => Ok(code),
            _ => Err(ConfigError::InvalidValue {
                name: "RELAY_RETRY_STATUSES",
                value: part.to_string(),
            }),
        })
        .collect()
}

fn unit_or_seconds<F>(lookup: &F, name: &str) -> Result<IntervalUnit, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map_or(Ok(IntervalUnit::Seconds), |raw| raw.parse())
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
        }),
    }
}
