//! Save / overwrite / restore against a shared clipboard.
//!
//! Every step takes the clipboard lock for its own duration only, so
//! other processes can use the clipboard between steps. The sequence as
//! a whole is therefore not atomic: two clients racing interleave their
//! steps and the last restore wins.
//!
//! If the process dies between [`ClipboardTransaction::set_text`] and
//! [`ClipboardTransaction::restore`], the clipboard keeps the pasted
//! text. Snapshots live in memory only.

use std::ops::{Deref, DerefMut};

use super::{
    ClipboardError, ClipboardService, ClipboardSnapshot, PasteText, TEXT_PLAIN, TransactionStep,
};

/// Clipboard transaction driven by the paste client.
pub struct ClipboardTransaction<C: ClipboardService> {
    clipboard: C,
}

impl<C: ClipboardService> ClipboardTransaction<C> {
    pub fn new(clipboard: C) -> Self {
        Self { clipboard }
    }

    /// Copy the whole current clipboard. Leaves it unchanged.
    pub fn save(&mut self) -> Result<ClipboardSnapshot, ClipboardError> {
        tracing::info!("saving clipboard");
        let guard = self.lock(TransactionStep::Save)?;
        let snapshot = ClipboardSnapshot::new(guard.data().clone());
        tracing::debug!(entries = snapshot.entries().len(), "clipboard saved");
        Ok(snapshot)
    }

    /// Replace the plain-text entry with `text` and commit.
    pub fn set_text(&mut self, text: &PasteText) -> Result<(), ClipboardError> {
        tracing::info!(bytes = text.as_bytes().len(), "setting clipboard text");
        let mut guard = self.lock(TransactionStep::SetText)?;

        let data = guard.data_mut();
        data.remove_name(TEXT_PLAIN);
        data.add_data(TEXT_PLAIN, text.as_bytes().to_vec());

        guard.commit().map_err(|status| ClipboardError::Commit {
            step: TransactionStep::SetText,
            status,
        })
    }

    /// Clear the clipboard and put `snapshot` back in its place.
    ///
    /// Entries the platform cannot hold are still reported as a failure
    /// after the rest of the snapshot has been published.
    pub fn restore(&mut self, snapshot: ClipboardSnapshot) -> Result<(), ClipboardError> {
        tracing::info!("restoring clipboard");
        let mut guard = self.lock(TransactionStep::Restore)?;

        guard.clear();
        *guard.data_mut() = snapshot.into_data();
        let dropped = guard.unpublishable();

        guard.commit().map_err(|status| ClipboardError::Commit {
            step: TransactionStep::Restore,
            status,
        })?;

        if dropped.is_empty() {
            Ok(())
        } else {
            Err(ClipboardError::Dropped {
                step: TransactionStep::Restore,
                dropped,
            })
        }
    }

    /// Lock the clipboard and load its current content.
    fn lock(&mut self, step: TransactionStep) -> Result<LockGuard<'_, C>, ClipboardError> {
        self.clipboard
            .lock()
            .map_err(|reason| ClipboardError::Lock { step, reason })?;
        let mut guard = LockGuard {
            clipboard: &mut self.clipboard,
        };
        guard
            .load()
            .map_err(|reason| ClipboardError::Read { step, reason })?;
        Ok(guard)
    }
}

/// Holds the clipboard lock; unlocks on drop, including error paths.
struct LockGuard<'a, C: ClipboardService> {
    clipboard: &'a mut C,
}

impl<C: ClipboardService> Deref for LockGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.clipboard
    }
}

impl<C: ClipboardService> DerefMut for LockGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.clipboard
    }
}

impl<C: ClipboardService> Drop for LockGuard<'_, C> {
    fn drop(&mut self) {
        self.clipboard.unlock();
    }
}
