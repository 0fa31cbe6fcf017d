//! Clipboard model: entries, snapshots, and the service abstraction.
//!
//! The clipboard is an ordered set of named entries (one per MIME type)
//! behind an exclusive lock. [`ClipboardService`] is the narrow interface
//! the transaction needs from a platform clipboard; [`x11::XclipClipboard`]
//! is the production implementation.

#[cfg(test)]
pub(crate) mod memory;
pub mod transaction;
pub mod x11;

use std::fmt;

pub use transaction::ClipboardTransaction;

/// Entry name of the plain-text payload.
pub const TEXT_PLAIN: &str = "text/plain";

/// One typed clipboard entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Full clipboard content, entries kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipData {
    entries: Vec<ClipboardEntry>,
}

impl ClipData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ClipboardEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Data of the first entry called `name`.
    pub fn find(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Remove every entry called `name`. Returns how many were removed.
    pub fn remove_name(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        before - self.entries.len()
    }

    /// Append an entry.
    pub fn add_data(&mut self, name: &str, data: Vec<u8>) {
        self.entries.push(ClipboardEntry {
            name: name.to_string(),
            data,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Clipboard state captured by [`ClipboardTransaction::save`].
///
/// Opaque to callers; only the transaction can put it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot(ClipData);

impl ClipboardSnapshot {
    pub(crate) fn new(data: ClipData) -> Self {
        Self(data)
    }

    pub fn entries(&self) -> &[ClipboardEntry] {
        self.0.entries()
    }

    pub(crate) fn into_data(self) -> ClipData {
        self.0
    }
}

/// Text to paste, joined once from the command-line words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteText(Box<str>);

impl PasteText {
    /// Join `words` with single spaces. `None` when there are no words.
    pub fn from_words<I, S>(words: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = words.into_iter();
        let mut text = String::from(words.next()?.as_ref());
        for word in words {
            text.push(' ');
            text.push_str(word.as_ref());
        }
        Some(Self(text.into_boxed_str()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Status code of a commit the clipboard rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStatus(pub i32);

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Platform clipboard as seen by a transaction.
///
/// `load`, `data`, `data_mut`, `clear` and `commit` are only meaningful
/// between a successful `lock` and the matching `unlock`. `load` reads
/// the current clipboard into the working [`ClipData`]; `commit`
/// publishes the working copy.
pub trait ClipboardService {
    /// Acquire exclusive access. The error string explains the refusal.
    fn lock(&mut self) -> Result<(), String>;

    fn unlock(&mut self);

    /// Read the clipboard into the working copy.
    fn load(&mut self) -> Result<(), String>;

    fn data(&self) -> &ClipData;

    fn data_mut(&mut self) -> &mut ClipData;

    fn clear(&mut self);

    fn commit(&mut self) -> Result<(), CommitStatus>;

    /// Names of working entries the next `commit` cannot publish.
    fn unpublishable(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Transaction step, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStep {
    Save,
    SetText,
    Restore,
}

impl fmt::Display for TransactionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "save",
            Self::SetText => "set-text",
            Self::Restore => "restore",
        })
    }
}

/// Clipboard transaction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("{step}: failed to lock clipboard: {reason}")]
    Lock {
        step: TransactionStep,
        reason: String,
    },
    #[error("{step}: failed to read clipboard: {reason}")]
    Read {
        step: TransactionStep,
        reason: String,
    },
    #[error("{step}: clipboard rejected commit ({status})")]
    Commit {
        step: TransactionStep,
        status: CommitStatus,
    },
    #[error("{step}: clipboard could not keep {}", .dropped.join(", "))]
    Dropped {
        step: TransactionStep,
        dropped: Vec<String>,
    },
}

impl ClipboardError {
    pub fn step(&self) -> TransactionStep {
        match self {
            Self::Lock { step, .. }
            | Self::Read { step, .. }
            | Self::Commit { step, .. }
            | Self::Dropped { step, .. } => *step,
        }
    }
}
