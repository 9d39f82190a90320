//! Filesystem change watcher with debounce.
//!
//! Notifications from the backend arrive in bursts during bulk file
//! operations; a dedicated thread coalesces everything inside a short window
//! before invoking the change callback. The watch is an explicit handle with
//! `stop()`, never an implicit timer.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Coalescing window for change bursts.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Watches at most one root at a time.
#[derive(Default)]
pub struct WorkspaceWatcher {
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    root: PathBuf,
    watcher: RecommendedWatcher,
    thread: Option<JoinHandle<()>>,
}

impl WorkspaceWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root currently being watched, if any.
    pub fn watching(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.root.as_path())
    }

    /// Start watching `root`, replacing any watch on a different root. A
    /// watch already on `root` is kept as-is.
    pub fn start(&mut self, root: &Path, on_change: ChangeCallback) {
        self.start_with_window(root, DEBOUNCE_WINDOW, on_change);
    }

    pub fn start_with_window(&mut self, root: &Path, window: Duration, on_change: ChangeCallback) {
        if self.watching() == Some(root) {
            return;
        }
        self.stop();

        let (tx, rx) = mpsc::channel::<()>();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create filesystem watcher");
                return;
            }
        };
        if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
            tracing::warn!(root = %root.display(), error = %e, "failed to watch workspace root");
            return;
        }

        let thread = std::thread::spawn(move || {
            while rx.recv().is_ok() {
                // Drain the burst; fire once when the window stays quiet.
                loop {
                    match rx.recv_timeout(window) {
                        Ok(()) => continue,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            on_change();
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => return,
                    }
                }
            }
        });

        tracing::debug!(root = %root.display(), "watching workspace");
        self.active = Some(ActiveWatch {
            root: root.to_path_buf(),
            watcher,
            thread: Some(thread),
        });
    }

    /// Stop watching. Safe to call when no watch is active, and from inside
    /// the change callback itself.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            // Dropping the watcher closes the event channel, which ends the
            // debounce thread.
            drop(active.watcher);
            if let Some(handle) = active.thread.take() {
                // A callback reacting to a change may re-enter stop() on the
                // debounce thread; joining it from itself would deadlock.
                // The closed channel already lets it run to completion.
                if handle.thread().id() == std::thread::current().id() {
                    drop(handle);
                } else {
                    let _ = handle.join();
                }
            }
        }
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
