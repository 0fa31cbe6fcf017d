//! X11 clipboard service: read/write via `xclip`, locking via `flock`.
//!
//! The X11 selection has no lock of its own. Exclusive access is an
//! advisory `flock` on a file in the runtime directory, which every
//! autopaste client honours. Waiting is bounded by the lock timeout.
//!
//! xclip serves a single target per selection owner, so [`commit`]
//! publishes one entry: `text/plain` when present, otherwise the first
//! entry. The other entries are reported by [`unpublishable`] so a
//! restore that cannot bring them back fails instead of losing them
//! silently.
//!
//! [`commit`]: ClipboardService::commit
//! [`unpublishable`]: ClipboardService::unpublishable

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

use super::{ClipData, ClipboardService, CommitStatus, TEXT_PLAIN};
use crate::config::ensure_private_dir;

/// Pause between non-blocking lock attempts.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Targets describing the selection rather than holding data.
const META_TARGETS: &[&str] = &[
    "TARGETS",
    "TIMESTAMP",
    "MULTIPLE",
    "SAVE_TARGETS",
    "DELETE",
    "INCR",
];

/// Legacy text targets, most preferred first.
const TEXT_ALIASES: &[&str] = &["UTF8_STRING", "STRING", "TEXT", "COMPOUND_TEXT"];

/// X11 implementation of [`ClipboardService`].
pub struct XclipClipboard {
    program: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    held: Option<Flock<File>>,
    working: ClipData,
}

impl XclipClipboard {
    pub fn new(lock_path: PathBuf, lock_timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("xclip"),
            lock_path,
            lock_timeout,
            held: None,
            working: ClipData::new(),
        }
    }
}

#[cfg(test)]
impl XclipClipboard {
    /// Run `program` in place of `xclip` from `$PATH`.
    fn with_program(program: PathBuf, lock_path: PathBuf, lock_timeout: Duration) -> Self {
        Self {
            program,
            ..Self::new(lock_path, lock_timeout)
        }
    }
}

impl ClipboardService for XclipClipboard {
    fn lock(&mut self) -> Result<(), String> {
        self.held = Some(acquire_flock(&self.lock_path, self.lock_timeout)?);
        Ok(())
    }

    fn unlock(&mut self) {
        if let Some(flock) = self.held.take()
            && let Err((_, errno)) = flock.unlock()
        {
            tracing::debug!(error = %errno, "clipboard unlock failed");
        }
    }

    fn load(&mut self) -> Result<(), String> {
        self.working = read_clipboard(&self.program)?;
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
        let (name, data) = commit_entry(&self.working);
        write_clipboard(&self.program, name, data)
    }

    fn unpublishable(&self) -> Vec<String> {
        let (name, _) = commit_entry(&self.working);
        let entries = self.working.entries();
        // commit_entry picks the first entry carrying that name.
        let published = entries.iter().position(|e| e.name == name);
        entries
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != published)
            .map(|(_, e)| e.name.clone())
            .collect()
    }
}

/// Take an exclusive `flock` on `path`, retrying until `timeout` passes.
fn acquire_flock(path: &Path, timeout: Duration) -> Result<Flock<File>, String> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)
            .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| format!("failed to open {}: {e}", path.display()))?;

    let deadline = Instant::now() + timeout;
    loop {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => return Ok(flock),
            Err((returned, Errno::EAGAIN)) if Instant::now() < deadline => {
                file = returned;
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err((_, Errno::EAGAIN)) => {
                return Err(format!("clipboard busy for {}ms", timeout.as_millis()));
            }
            Err((_, errno)) => return Err(format!("flock {}: {errno}", path.display())),
        }
    }
}

/// A target to fetch and the entry name to store it under.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    source: String,
    name: String,
}

/// Pick the data targets out of a `TARGETS` listing.
///
/// MIME-typed targets are kept as-is. The legacy text aliases collapse
/// into one `text/plain` entry unless `text/plain` is offered directly.
fn select_targets(listing: &str) -> Vec<Target> {
    let offered: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !META_TARGETS.contains(t))
        .collect();

    let mut targets: Vec<Target> = Vec::new();
    for &t in &offered {
        if t.contains('/') && !targets.iter().any(|x| x.name == t) {
            targets.push(Target {
                source: t.to_string(),
                name: t.to_string(),
            });
        }
    }

    if !targets.iter().any(|t| t.name == TEXT_PLAIN)
        && let Some(alias) = TEXT_ALIASES.iter().find(|a| offered.contains(*a))
    {
        targets.push(Target {
            source: (*alias).to_string(),
            name: TEXT_PLAIN.to_string(),
        });
    }

    targets
}

/// The single entry a commit publishes.
fn commit_entry(data: &ClipData) -> (&str, &[u8]) {
    data.entries()
        .iter()
        .find(|e| e.name == TEXT_PLAIN)
        .or_else(|| data.entries().first())
        .map(|e| (e.name.as_str(), e.data.as_slice()))
        .unwrap_or((TEXT_PLAIN, &[][..]))
}

fn read_clipboard(program: &Path) -> Result<ClipData, String> {
    let mut data = ClipData::new();

    // No owner, or an owner without TARGETS support: nothing to save.
    let targets_args = ["-selection", "clipboard", "-t", "TARGETS", "-o"];
    let Some(listing) = xclip_output(program, &targets_args)? else {
        return Ok(data);
    };

    for target in select_targets(&String::from_utf8_lossy(&listing)) {
        let args = ["-selection", "clipboard", "-t", target.source.as_str(), "-o"];
        match xclip_output(program, &args)? {
            Some(bytes) => data.add_data(&target.name, bytes),
            None => tracing::debug!(atom = %target.source, "clipboard target vanished"),
        }
    }

    Ok(data)
}

/// Run `xclip` and collect stdout. `Ok(None)` on a non-zero exit.
fn xclip_output(program: &Path, args: &[&str]) -> Result<Option<Vec<u8>>, String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("failed to spawn {}: {e}", program.display()))?;

    Ok(output.status.success().then_some(output.stdout))
}

fn write_clipboard(program: &Path, target: &str, content: &[u8]) -> Result<(), CommitStatus> {
    let io_status = |e: std::io::Error| CommitStatus(e.raw_os_error().unwrap_or(-1));

    let mut child = Command::new(program)
        .args(["-selection", "clipboard", "-t", target, "-i"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            tracing::warn!(error = %e, program = %program.display(), "failed to spawn xclip");
            io_status(e)
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(content).map_err(io_status)?;
        // Drop stdin to close the pipe so xclip can finish.
    }

    let status = child.wait().map_err(io_status)?;
    if status.success() {
        Ok(())
    } else {
        Err(CommitStatus(status.code().unwrap_or(-1)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard};

    use super::*;
    use crate::clipboard::{ClipboardError, ClipboardTransaction, PasteText, TransactionStep};

    fn names(targets: &[Target]) -> Vec<&str> {
        targets.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn meta_targets_are_skipped() {
        let targets = select_targets("TARGETS\nTIMESTAMP\nMULTIPLE\nSAVE_TARGETS\n");
        assert!(targets.is_empty());
    }

    #[test]
    fn mime_targets_keep_their_order() {
        let targets = select_targets("TARGETS\nimage/png\ntext/html\ntext/plain\n");
        assert_eq!(names(&targets), ["image/png", "text/html", "text/plain"]);
    }

    #[test]
    fn text_aliases_collapse_to_text_plain() {
        let targets = select_targets("TARGETS\nSTRING\nUTF8_STRING\nTEXT\n");
        assert_eq!(
            targets,
            [Target {
                source: "UTF8_STRING".into(),
                name: TEXT_PLAIN.into(),
            }]
        );
    }

    #[test]
    fn explicit_text_plain_wins_over_aliases() {
        let targets = select_targets("UTF8_STRING\ntext/plain\n");
        assert_eq!(names(&targets), ["text/plain"]);
        assert_eq!(targets[0].source, "text/plain");
    }

    #[test]
    fn duplicate_and_blank_lines_are_ignored() {
        let targets = select_targets("image/png\n\n  image/png  \n");
        assert_eq!(names(&targets), ["image/png"]);
    }

    #[test]
    fn commit_prefers_text_plain() {
        let mut data = ClipData::new();
        data.add_data("image/png", vec![1]);
        data.add_data(TEXT_PLAIN, b"t".to_vec());
        assert_eq!(commit_entry(&data), (TEXT_PLAIN, &b"t"[..]));
    }

    #[test]
    fn commit_falls_back_to_first_entry() {
        let mut data = ClipData::new();
        data.add_data("image/png", vec![1]);
        data.add_data("text/html", vec![2]);
        assert_eq!(commit_entry(&data), ("image/png", &[1u8][..]));
    }

    #[test]
    fn commit_of_empty_clipboard_is_empty_text() {
        assert_eq!(commit_entry(&ClipData::new()), (TEXT_PLAIN, &[][..]));
    }

    #[test]
    fn flock_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipboard.lock");

        let _held = acquire_flock(&path, Duration::from_millis(50)).unwrap();

        let start = Instant::now();
        let err = acquire_flock(&path, Duration::from_millis(50)).unwrap_err();
        assert!(err.contains("busy"), "got {err}");
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn flock_is_free_again_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("clipboard.lock");

        let held = acquire_flock(&path, Duration::from_millis(50)).unwrap();
        drop(held);

        assert!(acquire_flock(&path, Duration::from_millis(50)).is_ok());
    }

    /// Shell stand-in for `xclip`. Each offered target is a file in
    /// `state/` (slashes stored as `%`). A write replaces every target,
    /// like a new selection owner. `state.fail` holds an exit code that
    /// makes writes fail.
    struct FakeXclip {
        dir: tempfile::TempDir,
        _serial: MutexGuard<'static, ()>,
    }

    // One fake at a time: exec of a script another thread still has open
    // for writing fails with ETXTBSY.
    static FAKE_XCLIP_LOCK: Mutex<()> = Mutex::new(());

    const FAKE_XCLIP: &str = r#"#!/bin/sh
state="$(dirname "$0")/state"
target="$4"
file="$state/$(printf %s "$target" | tr / %)"
if [ "$5" = "-i" ]; then
    if [ -f "$state.fail" ]; then
        cat > /dev/null
        exit "$(cat "$state.fail")"
    fi
    rm -f "$state"/*
    cat > "$file"
    exit 0
fi
if [ "$target" = "TARGETS" ]; then
    [ -n "$(ls "$state")" ] || exit 1
    echo TARGETS
    ls "$state" | tr % /
    exit 0
fi
[ -f "$file" ] || exit 1
cat "$file"
"#;

    impl FakeXclip {
        fn new(entries: &[(&str, &[u8])]) -> Self {
            use std::os::unix::fs::PermissionsExt;

            let serial = FAKE_XCLIP_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("state")).unwrap();
            let script = dir.path().join("xclip");
            std::fs::write(&script, FAKE_XCLIP).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

            let fake = Self {
                dir,
                _serial: serial,
            };
            for (name, data) in entries {
                std::fs::write(fake.target_file(name), data).unwrap();
            }
            fake
        }

        fn target_file(&self, name: &str) -> PathBuf {
            self.dir.path().join("state").join(name.replace('/', "%"))
        }

        fn fail_writes(&self, code: i32) {
            std::fs::write(self.dir.path().join("state.fail"), code.to_string()).unwrap();
        }

        /// Offered targets, sorted by name.
        fn contents(&self) -> Vec<(String, Vec<u8>)> {
            let mut entries: Vec<(String, Vec<u8>)> =
                std::fs::read_dir(self.dir.path().join("state"))
                    .unwrap()
                    .map(|e| {
                        let e = e.unwrap();
                        let name = e.file_name().to_string_lossy().replace('%', "/");
                        (name, std::fs::read(e.path()).unwrap())
                    })
                    .collect();
            entries.sort();
            entries
        }

        fn clipboard(&self) -> XclipClipboard {
            XclipClipboard::with_program(
                self.dir.path().join("xclip"),
                self.dir.path().join("lock").join("clipboard.lock"),
                Duration::from_millis(200),
            )
        }
    }

    fn paste(words: &str) -> PasteText {
        PasteText::from_words(words.split(' ')).unwrap()
    }

    fn owned(entries: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
        entries
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect()
    }

    #[test]
    fn single_target_clipboards_round_trip() {
        let shapes: [&[(&str, &[u8])]; 3] = [
            &[(TEXT_PLAIN, b"original")],
            &[("image/png", &[0x89, b'P', b'N', b'G', 0, 0xff])],
            &[(TEXT_PLAIN, "caf\u{e9}".as_bytes())],
        ];

        for shape in shapes {
            let xclip = FakeXclip::new(shape);
            let mut tx = ClipboardTransaction::new(xclip.clipboard());

            let snapshot = tx.save().unwrap();
            assert_eq!(snapshot.entries().len(), 1);

            tx.set_text(&paste("hello world")).unwrap();
            assert_eq!(xclip.contents(), owned(&[(TEXT_PLAIN, b"hello world")]));

            tx.restore(snapshot).unwrap();
            assert_eq!(xclip.contents(), owned(shape), "shape {shape:?} not restored");
        }
    }

    #[test]
    fn empty_clipboard_restores_as_empty_text() {
        let xclip = FakeXclip::new(&[]);
        let mut tx = ClipboardTransaction::new(xclip.clipboard());

        let snapshot = tx.save().unwrap();
        assert!(snapshot.entries().is_empty());
        tx.set_text(&paste("x")).unwrap();
        tx.restore(snapshot).unwrap();

        assert_eq!(xclip.contents(), owned(&[(TEXT_PLAIN, b"")]));
    }

    #[test]
    fn restore_of_rich_clipboard_names_the_lost_entries() {
        let xclip = FakeXclip::new(&[("text/html", b"<b>hi</b>"), (TEXT_PLAIN, b"hi")]);
        let mut tx = ClipboardTransaction::new(xclip.clipboard());

        let snapshot = tx.save().unwrap();
        tx.set_text(&paste("hello")).unwrap();
        let err = tx.restore(snapshot).unwrap_err();

        assert_eq!(
            err,
            ClipboardError::Dropped {
                step: TransactionStep::Restore,
                dropped: vec!["text/html".into()],
            }
        );
        assert!(err.to_string().contains("text/html"));
        assert_eq!(xclip.contents(), owned(&[(TEXT_PLAIN, b"hi")]));
    }

    #[test]
    fn set_text_on_rich_clipboard_succeeds() {
        let xclip = FakeXclip::new(&[("text/html", b"<i>a</i>"), (TEXT_PLAIN, b"a")]);
        let mut tx = ClipboardTransaction::new(xclip.clipboard());

        tx.set_text(&paste("b")).unwrap();

        assert_eq!(xclip.contents(), owned(&[(TEXT_PLAIN, b"b")]));
    }

    #[test]
    fn non_zero_xclip_exit_is_a_commit_error() {
        let xclip = FakeXclip::new(&[(TEXT_PLAIN, b"keep")]);
        xclip.fail_writes(3);
        let mut tx = ClipboardTransaction::new(xclip.clipboard());

        let err = tx.set_text(&paste("new")).unwrap_err();

        assert_eq!(
            err,
            ClipboardError::Commit {
                step: TransactionStep::SetText,
                status: CommitStatus(3),
            }
        );
        assert_eq!(xclip.contents(), owned(&[(TEXT_PLAIN, b"keep")]));
    }

    #[test]
    fn missing_xclip_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let clipboard = XclipClipboard::with_program(
            dir.path().join("no-such-xclip"),
            dir.path().join("clipboard.lock"),
            Duration::from_millis(50),
        );
        let mut tx = ClipboardTransaction::new(clipboard);

        let err = tx.save().unwrap_err();

        assert!(
            matches!(err, ClipboardError::Read { step: TransactionStep::Save, .. }),
            "got {err:?}"
        );
        assert!(err.to_string().contains("failed to read clipboard"));
        // The flock was released when the read failed.
        assert!(acquire_flock(&dir.path().join("clipboard.lock"), Duration::ZERO).is_ok());
    }

    #[test]
    fn unpublishable_lists_all_but_the_committed_entry() {
        let mut clipboard = XclipClipboard::new(PathBuf::from("/unused"), Duration::ZERO);
        let data = clipboard.data_mut();
        data.add_data("image/png", vec![1]);
        data.add_data(TEXT_PLAIN, b"a".to_vec());
        data.add_data(TEXT_PLAIN, b"b".to_vec());

        assert_eq!(clipboard.unpublishable(), ["image/png", TEXT_PLAIN]);
    }
}
