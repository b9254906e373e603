// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod error;
mod logger;
mod stdin_source;

use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use event_relay::{DeliveryOrchestrator, OrchestratorConfig, RelayConfig};

use crate::error::AgentError;
use crate::stdin_source::StdinCapture;

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = std::env::var("RELAY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    if let Err(e) = init_logging(&log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str) -> Result<(), AgentError> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let filter = EnvFilter::try_new(env_filter).map_err(|e| AgentError::Logging(e.to_string()))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .event_format(logger::Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AgentError::Logging(e.to_string()))?;
    debug!("Logging subsystem enabled");
    Ok(())
}

async fn run() -> Result<(), AgentError> {
    let config = RelayConfig::from_env()?;
    info!(
        "Starting event relay: window {} ms, flush every {} ms",
        config.window_interval.as_millis(),
        config.flush_interval.as_millis()
    );

    let batcher = Arc::new(config.batcher()?);
    let capture = StdinCapture::new();
    let orchestrator = DeliveryOrchestrator::new(OrchestratorConfig {
        batcher: batcher.clone(),
        transform: config.transform.build()?,
        sink: config.sink.build()?,
        capture: Arc::new(capture.clone()),
        tick_interval: config.flush_interval,
    })?;

    let eof = CancellationToken::new();
    capture.spawn_reader(BufReader::new(io::stdin()), batcher, eof.clone())?;
    orchestrator.start();

    let result = tokio::select! {
        () = eof.cancelled() => {
            info!("Input closed, shutting down");
            Ok(())
        }
        () = orchestrator.stopped() => Err(AgentError::DeliveryFailed),
        signal = shutdown_signal() => match signal {
            Ok(name) => {
                info!("Received {name}, shutting down");
                Ok(())
            }
            Err(e) => Err(AgentError::Io(e)),
        },
    };

    orchestrator.stop().await;
    capture.close();
    result
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        result = tokio::signal::ctrl_c() => result.map(|()| "Ctrl+C"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
}
