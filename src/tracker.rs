use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::WatchError;

/// Half-open range of freshly appended bytes, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Result of reconciling one cursor against the file on disk.
#[derive(Debug)]
pub enum PollOutcome {
    /// File size equals the cursor. The common case: one stat, no read.
    NoChange,
    /// New bytes were appended past the cursor.
    Appended(ByteRange),
    /// The file shrank below the cursor. The cursor has been reset to 0 and
    /// the whole current content is reported as fresh. A false positive costs
    /// a reprocess; a missed rotation costs combat events, so shrink always
    /// wins.
    Rotated(ByteRange),
    /// The file no longer exists. Its cursor has been dropped.
    Vanished,
    /// Stat failed for a reason other than deletion. The cursor is unchanged
    /// and the poll should be retried on the next notification.
    StatFailed(std::io::Error),
}

/// Per-file read cursors for tail-style consumption.
///
/// Cursors only advance through [`commit`](Self::commit), after the caller
/// confirms the polled byte range was actually consumed. A read that fails
/// mid-way therefore leaves the range pending and it is returned again on the
/// next poll (at-least-once delivery).
#[derive(Debug, Default)]
pub struct FilePositionTracker {
    cursors: HashMap<PathBuf, u64>,
}

impl FilePositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `path`. Without backfill the cursor is seeded at the
    /// current end of file, so pre-existing content is never replayed; with
    /// backfill it starts at 0. Re-registering a tracked path keeps its
    /// cursor.
    pub fn register_file(&mut self, path: &Path, backfill: bool) -> Result<u64, WatchError> {
        if let Some(offset) = self.cursors.get(path) {
            return Ok(*offset);
        }

        let offset = if backfill {
            0
        } else {
            stat_size(path).map_err(|source| WatchError::FileStat {
                path: path.to_path_buf(),
                source,
            })?
        };
        self.cursors.insert(path.to_path_buf(), offset);
        Ok(offset)
    }

    /// Stats `path` and reports whatever lies beyond the cursor. A path never
    /// registered is seeded at 0, so its whole content is reported (a modify
    /// notification can arrive before the create that should have seeded it).
    pub fn poll_appended(&mut self, path: &Path) -> PollOutcome {
        let offset = *self.cursors.entry(path.to_path_buf()).or_insert(0);

        let size = match stat_size(path) {
            Ok(size) => size,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                self.cursors.remove(path);
                return PollOutcome::Vanished;
            }
            Err(source) => return PollOutcome::StatFailed(source),
        };

        if size < offset {
            self.cursors.insert(path.to_path_buf(), 0);
            return PollOutcome::Rotated(ByteRange {
                start: 0,
                end: size,
            });
        }

        if size == offset {
            return PollOutcome::NoChange;
        }

        PollOutcome::Appended(ByteRange {
            start: offset,
            end: size,
        })
    }

    /// Advances the cursor for `path` to `consumed_to`. Never moves a cursor
    /// backwards; rotation is the only path that rewinds, inside
    /// [`poll_appended`](Self::poll_appended).
    pub fn commit(&mut self, path: &Path, consumed_to: u64) {
        if let Some(offset) = self.cursors.get_mut(path) {
            if consumed_to > *offset {
                *offset = consumed_to;
            }
        }
    }

    /// Drops the cursor for a deleted or abandoned file.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.cursors.remove(path).is_some()
    }

    pub fn is_tracking(&self, path: &Path) -> bool {
        self.cursors.contains_key(path)
    }

    pub fn offset(&self, path: &Path) -> Option<u64> {
        self.cursors.get(path).copied()
    }
}

fn stat_size(path: &Path) -> std::io::Result<u64> {
    std::fs::metadata(path).map(|metadata| metadata.len())
}

#[cfg(test)]
mod tests {
    use super::{ByteRange, FilePositionTracker, PollOutcome};
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn log_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("combat_20260830.txt");
        fs::write(&path, content).unwrap();
        path
    }

    fn append(path: &PathBuf, content: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn registers_at_end_of_file_without_backfill() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "old line\n");
        let mut tracker = FilePositionTracker::new();

        let offset = tracker.register_file(&path, false).unwrap();

        assert_eq!(offset, 9);
        assert!(matches!(tracker.poll_appended(&path), PollOutcome::NoChange));
    }

    #[test]
    fn registers_at_zero_with_backfill() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "old line\n");
        let mut tracker = FilePositionTracker::new();

        let offset = tracker.register_file(&path, true).unwrap();

        assert_eq!(offset, 0);
        match tracker.poll_appended(&path) {
            PollOutcome::Appended(range) => assert_eq!(range, ByteRange { start: 0, end: 9 }),
            other => panic!("expected appended range, got {other:?}"),
        }
    }

    #[test]
    fn reports_appended_range_and_advances_only_on_commit() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let mut tracker = FilePositionTracker::new();
        tracker.register_file(&path, false).unwrap();

        append(&path, "first\n");

        let range = match tracker.poll_appended(&path) {
            PollOutcome::Appended(range) => range,
            other => panic!("expected appended range, got {other:?}"),
        };
        assert_eq!(range, ByteRange { start: 0, end: 6 });

        // Not committed yet: the same range is offered again.
        match tracker.poll_appended(&path) {
            PollOutcome::Appended(retry) => assert_eq!(retry, range),
            other => panic!("expected retried range, got {other:?}"),
        }

        tracker.commit(&path, range.end);
        assert!(matches!(tracker.poll_appended(&path), PollOutcome::NoChange));
    }

    #[test]
    fn polling_without_new_bytes_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "line\n");
        let mut tracker = FilePositionTracker::new();
        tracker.register_file(&path, false).unwrap();

        assert!(matches!(tracker.poll_appended(&path), PollOutcome::NoChange));
        assert!(matches!(tracker.poll_appended(&path), PollOutcome::NoChange));
        assert_eq!(tracker.offset(&path), Some(5));
    }

    #[test]
    fn shrunk_file_is_treated_as_rotated() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "a much longer original line\n");
        let mut tracker = FilePositionTracker::new();
        tracker.register_file(&path, false).unwrap();

        fs::write(&path, "fresh\n").unwrap();

        match tracker.poll_appended(&path) {
            PollOutcome::Rotated(range) => assert_eq!(range, ByteRange { start: 0, end: 6 }),
            other => panic!("expected rotation, got {other:?}"),
        }
        assert_eq!(tracker.offset(&path), Some(0));

        tracker.commit(&path, 6);
        assert!(matches!(tracker.poll_appended(&path), PollOutcome::NoChange));
    }

    #[test]
    fn commit_never_moves_a_cursor_backwards() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "line\n");
        let mut tracker = FilePositionTracker::new();
        tracker.register_file(&path, false).unwrap();

        tracker.commit(&path, 2);

        assert_eq!(tracker.offset(&path), Some(5));
    }

    #[test]
    fn deleted_file_drops_its_cursor() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "line\n");
        let mut tracker = FilePositionTracker::new();
        tracker.register_file(&path, false).unwrap();

        fs::remove_file(&path).unwrap();

        assert!(matches!(tracker.poll_appended(&path), PollOutcome::Vanished));
        assert!(!tracker.is_tracking(&path));
    }

    #[test]
    fn modify_before_create_replays_the_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "surprise\n");
        let mut tracker = FilePositionTracker::new();

        match tracker.poll_appended(&path) {
            PollOutcome::Appended(range) => assert_eq!(range, ByteRange { start: 0, end: 9 }),
            other => panic!("expected appended range, got {other:?}"),
        }
    }
}
