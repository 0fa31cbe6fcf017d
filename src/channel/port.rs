//! Service side of the paste channel: create, accept, read, delete.
//!
//! Each accepted connection gets a reader task that decodes signal
//! frames and forwards them into one bounded queue. The listener drains
//! that queue through [`PortReader`], so signals from any number of
//! clients are consumed one at a time, in arrival order.
//!
//! Deleting the port cancels the acceptor and every reader task,
//! discards queued signals, and removes the socket file.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::ChannelError;
use super::codec::{Signal, SignalCodec};
use crate::config::ensure_private_dir;

/// Owning handle on a created channel. Dropping it deletes the channel.
pub struct Port {
    path: PathBuf,
    shutdown: CancellationToken,
    acceptor: Option<JoinHandle<()>>,
}

/// Read side of a [`Port`], moved into the listener.
pub struct PortReader {
    signals: mpsc::Receiver<Signal>,
    shutdown: CancellationToken,
}

impl Port {
    /// Create the channel at `path` with room for `capacity` pending
    /// signals.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Exists`] if a live service already owns `path`.
    /// A stale socket file left by a dead service is removed and
    /// replaced.
    pub async fn create(path: &Path, capacity: usize) -> Result<(Port, PortReader), ChannelError> {
        let listener = bind_socket(path).await?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shutdown = CancellationToken::new();
        let acceptor = tokio::spawn(accept_loop(listener, tx, shutdown.clone()));

        tracing::info!(path = %path.display(), capacity, "paste channel created");

        Ok((
            Port {
                path: path.to_path_buf(),
                shutdown: shutdown.clone(),
                acceptor: Some(acceptor),
            },
            PortReader {
                signals: rx,
                shutdown,
            },
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the channel. Blocked readers return `None`.
    pub fn delete(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };
        self.shutdown.cancel();
        acceptor.abort();

        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to remove socket");
        }
        tracing::info!(path = %self.path.display(), "paste channel deleted");
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl PortReader {
    /// Wait for the next signal. `None` once the port is deleted.
    ///
    /// Signals still queued at deletion are discarded.
    pub async fn read(&mut self) -> Option<Signal> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            signal = self.signals.recv() => signal,
        }
    }
}

async fn accept_loop(
    listener: UnixListener,
    signals: mpsc::Sender<Signal>,
    shutdown: CancellationToken,
) {
    // Dropping the set on exit aborts any reader still running.
    let mut readers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    readers.spawn(read_signals(stream, signals.clone(), shutdown.clone()));
                    tracing::debug!("accepted channel connection");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            },

            Some(_) = readers.join_next(), if !readers.is_empty() => {}
        }
    }
}

/// Forward every signal frame on one connection into the shared queue.
async fn read_signals(
    stream: UnixStream,
    signals: mpsc::Sender<Signal>,
    shutdown: CancellationToken,
) {
    let mut framed = FramedRead::new(stream, SignalCodec::new());

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return,
            frame = framed.next() => frame,
        };

        match frame {
            Some(Ok(signal)) => {
                // Full queue: stop reading so the writer backs up.
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    sent = signals.send(signal) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "closing channel connection after malformed frame");
                return;
            }
            None => return, // Clean disconnect.
        }
    }
}

/// Create the socket directory and bind the Unix listener.
///
/// On `EADDRINUSE`, probe the existing socket. A successful connect means
/// another service owns the channel; a failed one means the file is
/// stale, so it is removed and the bind retried.
async fn bind_socket(path: &Path) -> Result<UnixListener, ChannelError> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent).map_err(|e| ChannelError::MkdirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            match UnixStream::connect(path).await {
                Ok(_) => Err(ChannelError::Exists(path.to_path_buf())),
                Err(_) => {
                    tracing::info!(path = %path.display(), "removing stale socket");
                    std::fs::remove_file(path).map_err(|e| ChannelError::BindFailed {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                    UnixListener::bind(path).map_err(|e| ChannelError::BindFailed {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            }
        }
        Err(e) => Err(ChannelError::BindFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
