//! The notify-backed watcher and its polling thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};

use crate::change::FileChange;
use crate::error::WatchError;
use crate::listener::InvalidationListener;
use crate::target::InvalidationTarget;

/// Watches the shader directory recursively and runs an
/// [`InvalidationListener`] on its own thread.
///
/// Dropping the watcher stops both the platform watcher and the thread.
pub struct SourceWatcher {
    shader_dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SourceWatcher {
    /// Starts watching `shader_dir`, ticking the listener every `poll_interval`.
    pub fn start(
        shader_dir: &Path,
        target: Arc<dyn InvalidationTarget>,
        poll_interval: Duration,
    ) -> Result<Self, WatchError> {
        let shader_dir = std::fs::canonicalize(shader_dir).unwrap_or_else(|_| shader_dir.to_path_buf());
        let (tx, rx) = flume::unbounded::<FileChange>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for change in FileChange::from_event(event) {
                        // the receiver is gone only while shutting down
                        let _ = tx.send(change);
                    }
                }
                Err(e) => log::warn!("file watcher error: {e}"),
            },
            Config::default(),
        )?;
        watcher.watch(&shader_dir, RecursiveMode::Recursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            let mut listener = InvalidationListener::new(&shader_dir, rx);
            std::thread::Builder::new()
                .name("kiln-watch".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        std::thread::sleep(poll_interval);
                        if let Some(report) = listener.tick(target.as_ref()) {
                            log::debug!("applied file change batch: {report:?}");
                        }
                    }
                })?
        };
        log::info!("watching {} for shader changes", shader_dir.display());

        Ok(Self {
            shader_dir,
            watcher: Some(watcher),
            stop,
            thread: Some(thread),
        })
    }

    /// The watched directory.
    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    /// Stops watching and joins the listener thread. Idempotent.
    pub fn stop(&mut self) {
        self.watcher.take();
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("shader watch thread panicked");
            }
            log::info!("stopped watching {}", self.shader_dir.display());
        }
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
