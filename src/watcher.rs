use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::WatchError;
use crate::event::DamageEvent;
use crate::parser::CombatLineParser;
use crate::store::SharedEventStore;
use crate::tracker::{ByteRange, FilePositionTracker, PollOutcome};

/// Tuning for a watch session.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Only files with this extension are tailed (case-insensitive).
    pub file_extension: String,
    /// Replay content that already exists when a file is first seen, instead
    /// of seeding its cursor at end-of-file.
    pub backfill: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            file_extension: "txt".to_string(),
            backfill: false,
        }
    }
}

/// Tails every matching log file in one directory, feeding parsed damage
/// events into a shared store and an `on_event` callback.
///
/// Exactly one ingestion task appends to the store; filesystem notifications
/// for different files are serialized through it, so readers always observe a
/// prefix-consistent, timestamp-ordered view.
pub struct LogDirectoryWatcher<P> {
    directory: PathBuf,
    store: SharedEventStore,
    parser: P,
    config: WatcherConfig,
}

/// Handle to a running watch session.
pub struct LogWatchHandle {
    handle: JoinHandle<()>,
}

impl LogWatchHandle {
    /// Stops the session and waits for the watch task to terminate. The task
    /// owns the notify watcher, so its end releases every filesystem watch
    /// handle and abandons in-flight reads; because the task is awaited, no
    /// event is delivered once this returns.
    pub async fn stop(self) {
        self.handle.abort();
        // An aborted task resolves to a cancellation JoinError; expected.
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<P> LogDirectoryWatcher<P>
where
    P: CombatLineParser + 'static,
{
    pub fn new(
        directory: impl Into<PathBuf>,
        store: SharedEventStore,
        parser: P,
        config: WatcherConfig,
    ) -> Self {
        Self {
            directory: directory.into(),
            store,
            parser,
            config,
        }
    }

    /// Starts watching. Fails up front when the directory is missing or the
    /// platform watcher cannot be installed; after that, only directory-level
    /// failures terminate the session, and those terminate it alone.
    pub fn start<F>(self, on_event: F) -> Result<LogWatchHandle, WatchError>
    where
        F: Fn(&DamageEvent) + Send + 'static,
    {
        if !self.directory.is_dir() {
            return Err(WatchError::DirectoryNotFound {
                path: self.directory,
            });
        }

        let (notify_sender, notify_receiver) =
            mpsc::unbounded_channel::<Result<Event, notify::Error>>();

        let mut watcher = notify::recommended_watcher(move |result| {
            if notify_sender.send(result).is_err() {
                tracing::debug!("log watcher notification receiver dropped");
            }
        })?;
        watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;

        // Seed cursors before the loop runs: a notification that raced the
        // seeding sits in the channel and reconciles against these cursors
        // instead of replaying files from offset 0.
        let mut session = TailSession {
            store: self.store,
            parser: self.parser,
            config: self.config,
            on_event,
            tracker: FilePositionTracker::new(),
            fragments: HashMap::new(),
        };
        session.seed_existing_files(&self.directory)?;

        tracing::info!(directory = %self.directory.display(), "watching game log directory");

        let handle = tokio::spawn(async move {
            // Owned here so aborting the task drops the watch handles.
            let _watcher = watcher;
            run_watch_session(self.directory, session, notify_receiver).await;
        });

        Ok(LogWatchHandle { handle })
    }
}

async fn run_watch_session<P, F>(
    directory: PathBuf,
    mut session: TailSession<P, F>,
    mut notify_receiver: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
) where
    P: CombatLineParser,
    F: Fn(&DamageEvent),
{
    while let Some(notification_result) = notify_receiver.recv().await {
        match notification_result {
            Ok(event) => {
                if watch_root_removed(&event, &directory) {
                    tracing::error!(
                        directory = %directory.display(),
                        "watch root removed, stopping watch session"
                    );
                    break;
                }
                session.handle_notification(&event);
            }
            // The watch root vanished or became unwatchable: terminal for
            // this session. Per-file noise stays warn-and-retry below.
            Err(error) if is_terminal_watch_error(&error, &directory) => {
                tracing::error!(
                    directory = %directory.display(),
                    watch_error = %error,
                    "directory watch failed, stopping watch session"
                );
                break;
            }
            Err(error) => {
                tracing::warn!(notify_error = %error, "transient directory watch error");
            }
        }
    }

    tracing::debug!("watch session ended");
}

fn watch_root_removed(event: &Event, directory: &Path) -> bool {
    matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|path| path == directory)
}

fn is_terminal_watch_error(error: &notify::Error, directory: &Path) -> bool {
    match error.kind {
        notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => true,
        _ => error.paths.iter().any(|path| path == directory),
    }
}

struct TailSession<P, F> {
    store: SharedEventStore,
    parser: P,
    config: WatcherConfig,
    on_event: F,
    tracker: FilePositionTracker,
    /// Undecoded bytes after the last line terminator of the previous chunk,
    /// per file. Prepended to the next chunk so a line split across two
    /// notifications is parsed exactly once.
    fragments: HashMap<PathBuf, Vec<u8>>,
}

impl<P, F> TailSession<P, F>
where
    P: CombatLineParser,
    F: Fn(&DamageEvent),
{
    /// Seeds cursors for files already present at start. Without backfill
    /// their existing content is skipped; with backfill it is replayed.
    fn seed_existing_files(&mut self, directory: &Path) -> Result<(), WatchError> {
        let entries = std::fs::read_dir(directory).map_err(|source| WatchError::FileStat {
            path: directory.to_path_buf(),
            source,
        })?;

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(read_dir_error = %error, "skipping unreadable directory entry");
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !self.is_log_file(&path) {
                continue;
            }
            self.track_file(&path);
        }

        Ok(())
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case(&self.config.file_extension))
            .unwrap_or(false)
    }

    fn track_file(&mut self, path: &Path) {
        match self.tracker.register_file(path, self.config.backfill) {
            Ok(offset) => {
                tracing::debug!(path = %path.display(), offset, "tracking log file");
                if self.config.backfill {
                    self.drain_file(path);
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), stat_error = %error, "cannot track log file");
            }
        }
    }

    fn handle_notification(&mut self, event: &Event) {
        match event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    if self.is_log_file(path) {
                        self.track_file(path);
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in &event.paths {
                    if self.is_log_file(path) {
                        self.drain_file(path);
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    if self.tracker.forget(path) {
                        tracing::debug!(path = %path.display(), "watched log file removed");
                    }
                    self.fragments.remove(path);
                }
            }
            _ => {}
        }
    }

    fn drain_file(&mut self, path: &Path) {
        match self.tracker.poll_appended(path) {
            PollOutcome::NoChange => {}
            PollOutcome::Appended(range) => self.consume_range(path, range),
            PollOutcome::Rotated(range) => {
                tracing::info!(path = %path.display(), "log file rotated, reprocessing from start");
                // The held tail belonged to the old file generation.
                self.fragments.remove(path);
                self.consume_range(path, range);
            }
            PollOutcome::Vanished => {
                self.fragments.remove(path);
                tracing::debug!(path = %path.display(), "log file vanished");
            }
            PollOutcome::StatFailed(error) => {
                tracing::warn!(path = %path.display(), stat_error = %error, "stat failed, retrying on next notification");
            }
        }
    }

    fn consume_range(&mut self, path: &Path, range: ByteRange) {
        if range.is_empty() {
            self.tracker.commit(path, range.end);
            return;
        }

        let chunk = match read_range(path, range) {
            Ok(chunk) => chunk,
            Err(error) => {
                // Cursor not advanced: the same range is retried next poll.
                tracing::warn!(path = %path.display(), read_error = %error, "read failed, range will be retried");
                return;
            }
        };

        let mut buffer = self.fragments.remove(path).unwrap_or_default();
        buffer.extend_from_slice(&chunk);

        // Everything up to and including the last terminator is complete;
        // the remainder is held for the next chunk. Splitting on the byte
        // is safe: 0x0A never occurs inside a multi-byte UTF-8 sequence.
        let complete = match buffer.iter().rposition(|&byte| byte == b'\n') {
            Some(last_newline) => {
                let rest = buffer.split_off(last_newline + 1);
                std::mem::replace(&mut buffer, rest)
            }
            None => Vec::new(),
        };
        if !buffer.is_empty() {
            self.fragments.insert(path.to_path_buf(), buffer);
        }

        // The bytes are consumed either way: a malformed chunk is dropped
        // rather than allowed to block tailing forever.
        self.tracker.commit(path, range.end);

        if complete.is_empty() {
            return;
        }

        match String::from_utf8(complete) {
            Ok(text) => {
                for line in text.lines() {
                    if !line.trim().is_empty() {
                        self.ingest_line(line);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), decode_error = %error, "skipping undecodable log chunk");
            }
        }
    }

    fn ingest_line(&mut self, line: &str) {
        let Some(hit) = self.parser.parse(line) else {
            return;
        };

        let event = DamageEvent::observed(hit, Instant::now());
        self.store.write().append(event.clone());
        (self.on_event)(&event);
    }
}

fn read_range(path: &Path, range: ByteRange) -> Result<Vec<u8>, WatchError> {
    let read_error = |source| WatchError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    file.seek(SeekFrom::Start(range.start)).map_err(read_error)?;

    let mut chunk = vec![0_u8; range.len() as usize];
    file.read_exact(&mut chunk).map_err(read_error)?;
    Ok(chunk)
}
