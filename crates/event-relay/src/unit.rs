// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Captured events and the time-windowed batches they are grouped into.

use std::time::{SystemTime, UNIX_EPOCH};

/// Code carried by units the source could not classify.
pub const UNKNOWN_CODE: u32 = 0xFFFF;

/// Named non-printing events with a fixed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    LineBreak,
    Space,
    Tab,
}

impl Special {
    pub const fn code(self) -> u32 {
        match self {
            Special::LineBreak => 10,
            Special::Space => 32,
            Special::Tab => 9,
        }
    }
}

/// One captured event. Immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Char(char),
    Special(Special),
    Unknown,
}

impl Unit {
    /// Numeric code of the unit, the value the transform operates on.
    pub fn code(&self) -> u32 {
        match self {
            Unit::Char(c) => u32::from(*c),
            Unit::Special(special) => special.code(),
            Unit::Unknown => UNKNOWN_CODE,
        }
    }
}

impl From<char> for Unit {
    fn from(c: char) -> Self {
        match c {
            '\n' => Unit::Special(Special::LineBreak),
            ' ' => Unit::Special(Special::Space),
            '\t' => Unit::Special(Special::Tab),
            c if c.is_control() => Unit::Unknown,
            c => Unit::Char(c),
        }
    }
}

/// Units that arrived within one window, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub window_start: SystemTime,
    pub units: Vec<Unit>,
}

impl Batch {
    pub fn new(window_start: SystemTime) -> Self {
        Batch {
            window_start,
            units: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Window start as fractional seconds since the unix epoch.
    pub fn window_start_unix(&self) -> f64 {
        unix_seconds(self.window_start)
    }
}

pub(crate) fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
