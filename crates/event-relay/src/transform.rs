// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reversible per-unit transforms applied to batches before they leave the
//! process.
//!
//! These are obfuscation transforms. They give no confidentiality and no
//! tamper detection; integrity must be layered on top by whoever needs it.

use crate::error::ConfigError;
use crate::unit::{unix_seconds, Batch};
use serde::de::Deserializer;
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A batch whose units went through a [`ByteTransform`].
///
/// On the wire this is the pair `[window_start_unix_seconds, [code, ...]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub window_start: SystemTime,
    pub codes: Vec<u32>,
}

impl EncodedBatch {
    pub fn window_start_unix(&self) -> f64 {
        unix_seconds(self.window_start)
    }
}

impl Serialize for EncodedBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.window_start_unix())?;
        pair.serialize_element(&self.codes)?;
        pair.end()
    }
}

impl<'de> Deserialize<'de> for EncodedBatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (seconds, codes) = <(f64, Vec<u32>)>::deserialize(deserializer)?;
        let offset = Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)?;
        Ok(EncodedBatch {
            window_start: UNIX_EPOCH + offset,
            codes,
        })
    }
}

/// Stateless, reversible transform over unit codes.
///
/// Implementations must hold no mutable state so they can be shared across
/// threads, and `decode(encode(x)) == x` must hold for every code.
pub trait ByteTransform: Send + Sync {
    fn encode(&self, code: u32) -> u32;

    fn decode(&self, code: u32) -> u32;

    fn encode_batch(&self, batch: &Batch) -> EncodedBatch {
        EncodedBatch {
            window_start: batch.window_start,
            codes: batch.units.iter().map(|unit| self.encode(unit.code())).collect(),
        }
    }

    fn encode_all(&self, batches: Vec<Batch>) -> Vec<EncodedBatch> {
        batches.iter().map(|batch| self.encode_batch(batch)).collect()
    }
}

/// XOR with a single non-zero key byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorTransform {
    key: u8,
}

impl XorTransform {
    pub fn new(key: u8) -> Result<Self, ConfigError> {
        if key == 0 {
            return Err(ConfigError::InvalidKey(
                "xor key must be non-zero".to_string(),
            ));
        }
        Ok(XorTransform { key })
    }

    /// Parses a key from configuration text, e.g. `7` or `0x2a`.
    pub fn from_key_str(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => trimmed.parse::<u8>(),
        };
        let key = parsed.map_err(|_| {
            ConfigError::InvalidKey(format!("'{trimmed}' is not a single byte (1..=255)"))
        })?;
        Self::new(key)
    }

    pub fn key(&self) -> u8 {
        self.key
    }
}

impl ByteTransform for XorTransform {
    fn encode(&self, code: u32) -> u32 {
        code ^ u32::from(self.key)
    }

    fn decode(&self, code: u32) -> u32 {
        code ^ u32::from(self.key)
    }
}

/// Leaves codes untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityTransform;

impl ByteTransform for IdentityTransform {
    fn encode(&self, code: u32) -> u32 {
        code
    }

    fn decode(&self, code: u32) -> u32 {
        code
    }
}
