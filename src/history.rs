// src/history.rs
// Append-only chat history: in-memory ordered list mirrored to a plain-text log.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt as _;

/// Ordered list of every line this node has seen or sent, mirrored to `path`.
///
/// Not internally synchronized: it lives inside the registry's lock so that a
/// broadcast records and fans out a line in one critical section.
#[derive(Debug)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    lines: Vec<String>,
    file: Option<fs::File>,
}

impl HistoryStore {
    /// Memory-only history (nothing is persisted).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            lines: Vec::new(),
            file: None,
        }
    }

    /// Open the log at `path`, seeding memory with every line already in it.
    /// A missing file is an empty history.
    pub async fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lines = match fs::read_to_string(&path).await {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: Some(path),
            lines,
            file: None,
        })
    }

    /// Empty history that appends to `path` without reading what is already there.
    pub fn empty_at(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            lines: Vec::new(),
            file: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Record `line` in memory, then append it to the log.
    ///
    /// The in-memory entry is kept even when the disk write fails; the error is
    /// returned so the caller can report it.
    pub async fn append(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if self.file.is_none() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            self.file = Some(file);
        }
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        if let Some(f) = self.file.as_mut() {
            if let Err(e) = write_record(f, &record).await {
                // Reopen on the next append rather than keep writing to a broken handle.
                self.file = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop every line and delete the log file.
    pub async fn clear(&mut self) -> io::Result<()> {
        self.file = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        self.lines.clear();
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        if let Some(f) = self.file.as_mut() {
            f.flush().await?;
            f.sync_all().await?;
        }
        Ok(())
    }
}

async fn write_record(f: &mut fs::File, record: &str) -> io::Result<()> {
    f.write_all(record.as_bytes()).await?;
    f.flush().await
}
