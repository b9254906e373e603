// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line formatter for the relay agent.
//!
//! Every line carries the `EVENT_RELAY` prefix so relay output can be
//! filtered out of whatever else shares stderr.
//!
//! # Format
//!
//! ```text
//! EVENT_RELAY | LEVEL | [span_name{span_fields}: ] message {event_fields}
//! ```
//!
//! # Examples
//!
//! ```text
//! EVENT_RELAY | INFO | Starting delivery worker, ticking every 1000 ms over 1000 ms windows
//! EVENT_RELAY | WARN | HTTP_SINK | Failed to deliver after 3 attempts (10001 ms last attempt): ...
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

/// Prefixes every line with `EVENT_RELAY` so relay output is easy to pick
/// out of interleaved process logs.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    /// Writes `EVENT_RELAY | LEVEL | `, then the active spans from the root
    /// down, then the event's message and fields.
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "EVENT_RELAY | {} | ", event.metadata().level())?;

        // Span fields were formatted into the span's extensions by the fmt
        // layer when the span was created.
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
