//! In-process clipboard for tests.
//!
//! Handles created with [`MemoryClipboard::handle`] share one clipboard,
//! so a second handle can hold the lock and force contention. Knobs for
//! refusing locks and rejecting commits drive the failure paths.

use std::sync::{Arc, Mutex};

use super::{ClipData, ClipboardService, CommitStatus};

#[derive(Debug, Default)]
struct Shared {
    data: ClipData,
    locked: bool,
    grants_left: Option<usize>,
    reject_commit: Option<CommitStatus>,
    read_failure: Option<String>,
    refused: Vec<String>,
    lock_attempts: usize,
    history: Vec<ClipData>,
}

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    shared: Arc<Mutex<Shared>>,
    holding: bool,
    working: ClipData,
}

impl MemoryClipboard {
    pub fn with_entries(entries: &[(&str, &[u8])]) -> Self {
        let clipboard = Self::default();
        {
            let mut shared = clipboard.shared.lock().unwrap();
            for (name, data) in entries {
                shared.data.add_data(name, data.to_vec());
            }
        }
        clipboard
    }

    /// Another handle on the same clipboard, not holding the lock.
    pub fn handle(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            holding: false,
            working: ClipData::new(),
        }
    }

    /// Allow `n` more successful locks, then refuse every later one.
    pub fn deny_locks_after(&self, n: usize) {
        self.shared.lock().unwrap().grants_left = Some(n);
    }

    pub fn reject_commits(&self, status: CommitStatus) {
        self.shared.lock().unwrap().reject_commit = Some(status);
    }

    /// Make every load fail with `reason`.
    pub fn fail_reads(&self, reason: &str) {
        self.shared.lock().unwrap().read_failure = Some(reason.to_string());
    }

    /// Entries with these names are dropped by every commit.
    pub fn refuse_entries(&self, names: &[&str]) {
        self.shared.lock().unwrap().refused = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn contents(&self) -> ClipData {
        self.shared.lock().unwrap().data.clone()
    }

    /// Every committed state, oldest first.
    pub fn history(&self) -> Vec<ClipData> {
        self.shared.lock().unwrap().history.clone()
    }

    pub fn lock_attempts(&self) -> usize {
        self.shared.lock().unwrap().lock_attempts
    }

    pub fn is_locked(&self) -> bool {
        self.shared.lock().unwrap().locked
    }
}

impl ClipboardService for MemoryClipboard {
    fn lock(&mut self) -> Result<(), String> {
        let mut shared = self.shared.lock().unwrap();
        shared.lock_attempts += 1;
        if shared.locked {
            return Err("held by another client".into());
        }
        if let Some(left) = shared.grants_left.as_mut() {
            if *left == 0 {
                return Err("access denied".into());
            }
            *left -= 1;
        }
        shared.locked = true;
        self.holding = true;
        Ok(())
    }

    fn unlock(&mut self) {
        if self.holding {
            self.shared.lock().unwrap().locked = false;
            self.holding = false;
        }
    }

    fn load(&mut self) -> Result<(), String> {
        let shared = self.shared.lock().unwrap();
        if let Some(reason) = &shared.read_failure {
            return Err(reason.clone());
        }
        self.working = shared.data.clone();
        Ok(())
    }

    fn data(&self) -> &ClipData {
        &self.working
    }

    fn data_mut(&mut self) -> &mut ClipData {
        &mut self.working
    }

    fn clear(&mut self) {
        self.working.clear();
    }

    fn commit(&mut self) -> Result<(), CommitStatus> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(status) = shared.reject_commit {
            return Err(status);
        }
        let mut published = self.working.clone();
        for name in &shared.refused {
            published.remove_name(name);
        }
        shared.data = published.clone();
        shared.history.push(published);
        Ok(())
    }

    fn unpublishable(&self) -> Vec<String> {
        let shared = self.shared.lock().unwrap();
        self.working
            .entries()
            .iter()
            .filter(|e| shared.refused.contains(&e.name))
            .map(|e| e.name.clone())
            .collect()
    }
}
