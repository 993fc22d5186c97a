//! Watch Loop
//!
//! A debounced notify watcher on the input directory forwards paths that
//! have gone quiet into a bounded channel. The loop is the only consumer: it
//! takes one event, runs the whole pipeline for that file on the blocking
//! pool, and only then takes the next one.
//!
//! ```text
//! Idle --event--> Dispatching --done--> Idle
//!   \--shutdown / channel closed--> Stopped
//! ```

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::ingestion::{format_size, FileReport, IngestHandler, IngestStats};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry in the input directory appeared or changed and has been
    /// quiet for the debounce period
    Created(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Dispatching,
    Stopped,
}

/// Final figures of a stopped loop
#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub stats: IngestStats,
    pub next_row_id: u64,
    pub final_state: LoopState,
}

/// Debounced subscription to one directory. Dropping it cancels the
/// subscription.
///
/// Creations, renames into the directory and writes all count as activity on
/// a path; the path is only forwarded once no event has touched it for the
/// debounce period.
pub struct DirectoryWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    dir: PathBuf,
}

impl DirectoryWatcher {
    pub fn subscribe(dir: &Path, debounce: Duration, tx: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for path in settled_paths(events) {
                        // Runs on the debouncer thread; blocks while the queue is full.
                        if tx.blocking_send(WatchEvent::Created(path)).is_err() {
                            debug!("Watch loop stopped, dropping event");
                        }
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            },
        )
        .map_err(|e| IngestError::Watch(format!("Failed to create file watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| IngestError::Watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        info!(
            "Watching {} for new files ({}ms quiet period)",
            dir.display(),
            debounce.as_millis()
        );
        Ok(Self {
            _debouncer: debouncer,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `AnyContinuous` means the path is still being written.
fn is_settled(kind: &DebouncedEventKind) -> bool {
    matches!(kind, DebouncedEventKind::Any)
}

fn settled_paths(events: Vec<DebouncedEvent>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = events
        .into_iter()
        .filter(|event| is_settled(&event.kind))
        .map(|event| event.path)
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

pub struct WatchLoop {
    handler: Arc<Mutex<IngestHandler>>,
    events: mpsc::Receiver<WatchEvent>,
    watcher: Option<DirectoryWatcher>,
    input_dir: PathBuf,
    scan_existing: bool,
    state: LoopState,
}

impl WatchLoop {
    /// Subscribe to the configured input directory, creating it if needed.
    pub fn subscribe(config: &IngestConfig, handler: IngestHandler) -> Result<Self> {
        std::fs::create_dir_all(&config.input_dir).map_err(|e| {
            IngestError::Watch(format!(
                "Failed to create input directory {}: {}",
                config.input_dir.display(),
                e
            ))
        })?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let watcher = DirectoryWatcher::subscribe(&config.input_dir, config.debounce(), tx)?;

        let mut watch_loop = Self::from_channel(config, handler, rx);
        watch_loop.watcher = Some(watcher);
        Ok(watch_loop)
    }

    /// Loop fed by an existing channel instead of a filesystem watcher.
    pub fn from_channel(
        config: &IngestConfig,
        handler: IngestHandler,
        events: mpsc::Receiver<WatchEvent>,
    ) -> Self {
        Self {
            handler: Arc::new(Mutex::new(handler)),
            events,
            watcher: None,
            input_dir: config.input_dir.clone(),
            scan_existing: config.scan_existing,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Drain events until `shutdown` resolves or every sender is gone.
    ///
    /// A file that is being dispatched when shutdown arrives is finished first.
    pub async fn run<F>(mut self, shutdown: F) -> LoopSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if self.scan_existing {
            for path in existing_files(&self.input_dir) {
                let stop = tokio::select! {
                    biased;
                    _ = &mut shutdown => true,
                    _ = std::future::ready(()) => false,
                };
                if stop {
                    info!("Shutdown requested during startup scan");
                    return self.stop();
                }
                self.dispatch(&path).await;
            }
        }

        loop {
            self.state = LoopState::Idle;

            let event = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    None
                }
                event = self.events.recv() => {
                    if event.is_none() {
                        info!("Event source closed");
                    }
                    event
                }
            };

            match event {
                Some(WatchEvent::Created(path)) => {
                    self.dispatch(&path).await;
                }
                None => break,
            }
        }

        self.stop()
    }

    /// Run the handler on the blocking pool so file I/O and Parquet encoding
    /// never hold up a runtime worker.
    async fn dispatch(&mut self, path: &Path) -> Option<FileReport> {
        self.state = LoopState::Dispatching;

        let handler = Arc::clone(&self.handler);
        let path = path.to_path_buf();
        match tokio::task::spawn_blocking(move || lock(&handler).handle(&path)).await {
            Ok(report) => report,
            Err(e) => {
                error!("Ingest task failed: {}", e);
                None
            }
        }
    }

    fn stop(mut self) -> LoopSummary {
        self.state = LoopState::Stopped;

        // Close first so a debouncer thread blocked on a full queue is released
        // before the watcher is torn down.
        self.events.close();
        if let Some(watcher) = self.watcher.take() {
            debug!("Unsubscribing from {}", watcher.dir().display());
        }

        let (stats, next_row_id) = {
            let handler = lock(&self.handler);
            (handler.stats().clone(), handler.next_row_id())
        };
        let ratio = stats
            .compression_ratio()
            .map_or_else(|| "n/a".to_string(), |r| format!("{:.2}", r));
        info!(
            succeeded = stats.files_succeeded,
            failed = stats.files_failed,
            skipped = stats.files_skipped,
            route_errors = stats.route_errors,
            rows = stats.rows_written,
            "Watch loop stopped: {} files, {} read, {} written (ratio {}), {:.2}s busy",
            stats.files_seen(),
            format_size(stats.source_bytes),
            format_size(stats.artifact_bytes),
            ratio,
            stats.busy_seconds
        );

        LoopSummary {
            stats,
            next_row_id,
            final_state: self.state,
        }
    }
}

/// A panic inside a dispatch poisons the mutex; the handler state is still
/// consistent because counters only move after a commit.
fn lock(handler: &Mutex<IngestHandler>) -> MutexGuard<'_, IngestHandler> {
    handler.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Regular files already in `dir`, sorted by name.
fn existing_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to scan {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
