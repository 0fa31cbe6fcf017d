//! Injection service: runs one [`InputInjector`] until SIGTERM or SIGINT.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};

use crate::config::ServiceConfig;
use crate::injector::sink::InjectionFailure;
use crate::injector::x11::XTestSink;
use crate::injector::{InjectorError, InjectorState, InputInjector};

/// Service startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("input sink: {0}")]
    Sink(#[from] InjectionFailure),
    #[error(transparent)]
    Injector(#[from] InjectorError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service until SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns `ServiceError` if the display cannot be reached, another
/// service already owns the channel, or the listener dies.
pub async fn run(config: ServiceConfig) -> Result<(), ServiceError> {
    let sink = XTestSink::connect()?;
    let injector = InputInjector::start(&config, Arc::new(sink)).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut state = injector.state_watch();

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = state.wait_for(|s| *s == InjectorState::Stopped) => {
            tracing::error!("listener exited unexpectedly");
        }
    }

    injector.stop().await?;
    Ok(())
}
