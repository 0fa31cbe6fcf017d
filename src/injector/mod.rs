//! Input injector: the service-side listener on the paste channel.
//!
//! [`InputInjector::start`] creates the channel and spawns one listener
//! task. Each signal read from the channel becomes exactly one
//! [`paste_event`] handed to the [`InputSink`], followed by a short
//! settle pause. [`InputInjector::stop`] deletes the channel and waits
//! for the listener to exit.

pub mod event;
pub mod sink;
pub mod x11;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::ChannelError;
use crate::channel::port::{Port, PortReader};
use crate::config::ServiceConfig;
use event::{now_micros, paste_event};
use sink::InputSink;

/// Injector lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("listener task panicked")]
    ListenerPanicked,
}

/// Observable listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectorState {
    Stopped,
    Listening,
    Synthesizing,
}

/// A running injector instance. Owns the channel and the listener task.
pub struct InputInjector {
    port: Port,
    listener: JoinHandle<()>,
    state: watch::Receiver<InjectorState>,
}

impl InputInjector {
    /// Create the channel and start listening.
    ///
    /// Fails with [`ChannelError::Exists`] if another instance already
    /// owns the configured channel path.
    pub async fn start(
        config: &ServiceConfig,
        sink: Arc<dyn InputSink>,
    ) -> Result<Self, InjectorError> {
        let (port, reader) = Port::create(&config.channel_path, config.queue_depth).await?;

        let (state_tx, state) = watch::channel(InjectorState::Listening);
        let listener = tokio::spawn(listen(reader, sink, config.settle, state_tx));

        tracing::info!(path = %config.channel_path.display(), "injector listening");
        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn state(&self) -> InjectorState {
        *self.state.borrow()
    }

    /// Receiver for state transitions.
    pub fn state_watch(&self) -> watch::Receiver<InjectorState> {
        self.state.clone()
    }

    pub fn channel_path(&self) -> &Path {
        self.port.path()
    }

    /// Delete the channel, then wait for the listener to finish its
    /// current iteration and exit.
    pub async fn stop(self) -> Result<(), InjectorError> {
        self.port.delete();

        match self.listener.await {
            Ok(()) => {
                tracing::info!("injector stopped");
                Ok(())
            }
            Err(e) if e.is_panic() => Err(InjectorError::ListenerPanicked),
            Err(_) => Ok(()), // Cancelled with the runtime.
        }
    }
}

async fn listen(
    mut reader: PortReader,
    sink: Arc<dyn InputSink>,
    settle: Duration,
    state: watch::Sender<InjectorState>,
) {
    while reader.read().await.is_some() {
        state.send_replace(InjectorState::Synthesizing);

        let event = paste_event(now_micros());
        let when = event.when;
        let delivery = {
            let sink = Arc::clone(&sink);
            tokio::task::spawn_blocking(move || sink.enqueue(event)).await
        };
        match delivery {
            Ok(Ok(())) => tracing::debug!(when, "paste keystroke injected"),
            Ok(Err(e)) => tracing::warn!(error = %e, "paste injection failed"),
            Err(e) => tracing::warn!(error = %e, "injection task failed"),
        }

        // Keep rapid signals from flooding the input stream.
        tokio::time::sleep(settle).await;
        state.send_replace(InjectorState::Listening);
    }

    state.send_replace(InjectorState::Stopped);
    tracing::debug!("listener exited");
}
