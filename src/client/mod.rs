//! Paste client: one clipboard transaction around one paste trigger.
//!
//! The sequence is save, set-text, trigger, restore. A failed save or
//! set-text ends the run. A failed trigger skips the post-signal wait but
//! still restores the saved clipboard, so a missing service leaves the
//! clipboard as it was found.

use std::path::Path;
use std::time::Duration;

use crate::channel::{ChannelError, PasteChannel};
use crate::clipboard::{ClipboardError, ClipboardService, ClipboardTransaction, PasteText};
use crate::config::ClientConfig;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum PasteError {
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("trigger: {source}{}", restore_note(.restore))]
    Trigger {
        source: ChannelError,
        /// Set when the restore that follows a failed trigger failed too.
        restore: Option<ClipboardError>,
    },
}

fn restore_note(restore: &Option<ClipboardError>) -> String {
    restore
        .as_ref()
        .map(|e| format!(" (then {e})"))
        .unwrap_or_default()
}

/// Run one paste transaction for `text` against `clipboard`.
pub async fn run<C: ClipboardService>(
    text: &PasteText,
    clipboard: C,
    config: &ClientConfig,
) -> Result<(), PasteError> {
    let mut tx = ClipboardTransaction::new(clipboard);

    let snapshot = tx.save()?;
    tx.set_text(text)?;

    if let Err(source) = trigger(&config.channel_path, config.trigger_delay).await {
        tracing::warn!(error = %source, "trigger failed, restoring clipboard");
        let restore = tx.restore(snapshot).err();
        return Err(PasteError::Trigger { source, restore });
    }

    tx.restore(snapshot)?;
    tracing::info!("paste complete");
    Ok(())
}

/// Signal the service, then give it `delay` to inject the keystroke.
///
/// No acknowledgement comes back; the delay is the only guarantee that
/// the paste happened before the clipboard is restored.
pub async fn trigger(path: &Path, delay: Duration) -> Result<(), ChannelError> {
    tracing::info!(path = %path.display(), "triggering paste");
    let mut channel = PasteChannel::lookup(path).await?;
    channel.signal().await?;
    tokio::time::sleep(delay).await;
    Ok(())
}
