//! Paste channel: the named rendezvous between client and service.
//!
//! The channel is a Unix domain socket at a fixed, well-known path. The
//! service creates it with [`port::Port::create`] and owns it for its whole
//! lifetime; clients only look it up and write signal frames through
//! [`PasteChannel`]. No payload crosses the channel: the arrival of a
//! frame is the entire message.

pub mod codec;
pub mod port;

use std::path::{Path, PathBuf};

use futures::SinkExt;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use codec::{CodecError, Signal, SignalCodec};

/// Name shared by client and service. Resolved to a socket path by
/// [`crate::config::channel_path`].
pub const CHANNEL_NAME: &str = "autopaste-output";

/// Channel errors, on either side of the socket.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("paste channel not found at {0}: start autopasted first")]
    NotFound(PathBuf),
    #[error("paste channel already exists at {0}")]
    Exists(PathBuf),
    #[error("paste channel closed by the service")]
    Closed,
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client handle on the service's paste channel.
pub struct PasteChannel {
    framed: Framed<UnixStream, SignalCodec>,
}

impl PasteChannel {
    /// Resolve the channel at `path`. Never creates it.
    ///
    /// A missing socket file and a socket nobody is listening on both
    /// mean the service is not running: [`ChannelError::NotFound`].
    pub async fn lookup(path: &Path) -> Result<Self, ChannelError> {
        let stream = UnixStream::connect(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                ChannelError::NotFound(path.to_path_buf())
            }
            _ => ChannelError::Io(e),
        })?;

        Ok(Self {
            framed: Framed::new(stream, SignalCodec::new()),
        })
    }

    /// Write one zero-length signal frame and flush it.
    ///
    /// Blocks only while the service's queue is full.
    pub async fn signal(&mut self) -> Result<(), ChannelError> {
        self.framed.send(Signal).await.map_err(|e| match e {
            CodecError::Io(io)
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                ) =>
            {
                ChannelError::Closed
            }
            other => ChannelError::Codec(other),
        })
    }
}
