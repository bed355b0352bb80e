//! Checkpoint log
//!
//! An append-only set of node ids whose results are already written. Read
//! once when a run starts to skip finished work, appended once per finished
//! node, never rewritten or compacted while a run is in progress.

use crate::graph::NodeId;
use rustc_hash::FxHashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Checkpoint errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete line that is not a node id
    #[error("Checkpoint corruption at line {line}: {content:?}")]
    Corrupt { line: usize, content: String },
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Set of processed node ids with a swappable persistence mechanism
pub trait Checkpoint: Send {
    /// Whether `id` was already processed
    fn contains(&self, id: NodeId) -> bool;

    /// Record `id` as processed. Returns `false` (and writes nothing) when it
    /// was already recorded.
    fn add(&mut self, id: NodeId) -> CheckpointResult<bool>;

    /// Push buffered entries to durable storage
    fn flush(&mut self) -> CheckpointResult<()>;

    /// Number of processed ids
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Newline-delimited id file
pub struct FileCheckpoint {
    /// Path to the checkpoint file
    path: PathBuf,
    done: FxHashSet<NodeId>,
    /// Opened lazily in append mode
    writer: Option<BufWriter<File>>,
    /// Flush after every add
    sync_mode: bool,
}

impl FileCheckpoint {
    /// Open a checkpoint file, loading the ids it already holds.
    ///
    /// A missing file is an empty checkpoint. A trailing line without a
    /// newline is the remains of an interrupted append: it is cut off the
    /// file, so that node is processed again.
    pub fn open(path: impl AsRef<Path>) -> CheckpointResult<Self> {
        let path = path.as_ref().to_path_buf();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let valid_len = content.rfind('\n').map_or(0, |pos| pos + 1);
        if valid_len < content.len() {
            warn!(
                "Dropping unterminated checkpoint entry {:?} in {:?}",
                &content[valid_len..],
                path
            );
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(valid_len as u64)?;
        }
        let lines: Vec<&str> = content[..valid_len].lines().collect();

        let mut done = FxHashSet::default();
        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let id: NodeId = trimmed.parse().map_err(|_| CheckpointError::Corrupt {
                line: idx + 1,
                content: line.to_string(),
            })?;
            done.insert(id);
        }

        info!("Opened checkpoint {:?}: {} processed ids", path, done.len());

        Ok(Self {
            path,
            done,
            writer: None,
            sync_mode: true,
        })
    }

    /// Set sync mode
    pub fn set_sync_mode(&mut self, sync: bool) {
        self.sync_mode = sync;
        debug!("Checkpoint sync mode: {}", sync);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> CheckpointResult<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }
}

impl Checkpoint for FileCheckpoint {
    fn contains(&self, id: NodeId) -> bool {
        self.done.contains(&id)
    }

    fn add(&mut self, id: NodeId) -> CheckpointResult<bool> {
        if self.done.contains(&id) {
            return Ok(false);
        }
        let sync = self.sync_mode;
        let writer = self.writer()?;
        writeln!(writer, "{}", id)?;
        if sync {
            writer.flush()?;
        }
        self.done.insert(id);
        Ok(true)
    }

    fn flush(&mut self) -> CheckpointResult<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.done.len()
    }
}

impl Drop for FileCheckpoint {
    fn drop(&mut self) {
        if let Err(e) = Checkpoint::flush(self) {
            warn!("Failed to flush checkpoint {:?}: {}", self.path, e);
        }
    }
}

/// In-memory checkpoint for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpoint {
    done: FxHashSet<NodeId>,
    /// Ids in the order they were added
    log: Vec<NodeId>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a set of already-processed ids
    pub fn with_ids(ids: impl IntoIterator<Item = NodeId>) -> Self {
        let mut checkpoint = Self::default();
        for id in ids {
            if checkpoint.done.insert(id) {
                checkpoint.log.push(id);
            }
        }
        checkpoint
    }

    pub fn log(&self) -> &[NodeId] {
        &self.log
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn contains(&self, id: NodeId) -> bool {
        self.done.contains(&id)
    }

    fn add(&mut self, id: NodeId) -> CheckpointResult<bool> {
        if !self.done.insert(id) {
            return Ok(false);
        }
        self.log.push(id);
        Ok(true)
    }

    fn flush(&mut self) -> CheckpointResult<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.done.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::open(temp_dir.path().join("ids.txt")).unwrap();
        assert!(checkpoint.is_empty());
    }

    #[test]
    fn test_add_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ids.txt");

        {
            let mut checkpoint = FileCheckpoint::open(&path).unwrap();
            assert!(checkpoint.add(3).unwrap());
            assert!(checkpoint.add(1).unwrap());
            assert!(!checkpoint.add(3).unwrap());
            assert!(checkpoint.contains(1));
            assert!(!checkpoint.contains(2));
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n1\n");

        let mut reopened = FileCheckpoint::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains(3));
        reopened.add(7).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n1\n7\n");
    }

    #[test]
    fn test_torn_last_line_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ids.txt");
        std::fs::write(&path, "4\n5\n12").unwrap();

        let mut checkpoint = FileCheckpoint::open(&path).unwrap();
        assert_eq!(checkpoint.len(), 2);
        assert!(!checkpoint.contains(12));

        checkpoint.add(123).unwrap();
        checkpoint.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4\n5\n123\n");
        let reopened = FileCheckpoint::open(&path).unwrap();
        assert!(reopened.contains(123));
        assert!(!reopened.contains(12));
        assert_eq!(reopened.len(), 3);
    }

    #[test]
    fn test_corrupt_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ids.txt");
        std::fs::write(&path, "1\nabc\n").unwrap();

        match FileCheckpoint::open(&path) {
            Err(CheckpointError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corruption error, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_buffered_mode_flushes_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("ids.txt");
        {
            let mut checkpoint = FileCheckpoint::open(&path).unwrap();
            checkpoint.set_sync_mode(false);
            checkpoint.add(9).unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "9\n");
    }

    #[test]
    fn test_memory_checkpoint() {
        let mut checkpoint = MemoryCheckpoint::with_ids([2, 2, 5]);
        assert_eq!(checkpoint.len(), 2);
        assert!(checkpoint.add(7).unwrap());
        assert!(!checkpoint.add(5).unwrap());
        assert_eq!(checkpoint.log(), &[2, 5, 7]);
    }
}
