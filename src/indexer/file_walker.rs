//! Directory traversal for indexing runs

use super::FileInfo;
use super::filters::PathFilters;
use super::language::detect_language;
use crate::error::{IndexingError, ScoutError};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of scanning a codebase root
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Readable files that passed every filter, in walk order
    pub files: Vec<FileInfo>,
    /// Files skipped by size, pattern, or unreadable content
    pub skipped: usize,
}

pub struct FileWalker {
    root: PathBuf,
    max_file_size: usize,
    max_depth: usize,
    filters: PathFilters,
    /// Checked between entries so a blocking walk can be cancelled
    cancelled: Option<Arc<AtomicBool>>,
}

impl FileWalker {
    pub fn new(
        root: impl AsRef<Path>,
        max_file_size: usize,
        max_depth: usize,
        filters: PathFilters,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_size,
            max_depth,
            filters,
            cancelled: None,
        }
    }

    /// Set a cancellation flag that will be checked during the walk.
    pub fn with_cancellation_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Walk the root and collect all eligible files.
    ///
    /// Files over the size limit, excluded by pattern, or unreadable as UTF-8
    /// text are counted as skipped, never as errors.
    pub fn walk(&self) -> Result<WalkOutcome, ScoutError> {
        if !self.root.exists() {
            return Err(
                IndexingError::RootNotFound(self.root.display().to_string()).into(),
            );
        }
        if !self.root.is_dir() {
            return Err(
                IndexingError::NotADirectory(self.root.display().to_string()).into(),
            );
        }

        let mut outcome = WalkOutcome::default();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true) // Respect .gitignore, .ignore, etc.
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .max_depth(Some(self.max_depth))
            .build();

        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", outcome.files.len());
                return Err(IndexingError::Cancelled.into());
            }

            let entry = entry
                .map_err(|e| IndexingError::WalkFailed(e.to_string()))?;
            let path = entry.path();

            if path.is_dir() {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            if !self.filters.allows(&relative_path) {
                outcome.skipped += 1;
                continue;
            }

            // A file at exactly the limit is processed; one byte over is skipped
            if let Ok(metadata) = fs::metadata(path)
                && metadata.len() > self.max_file_size as u64
            {
                tracing::debug!("Skipping large file: {:?}", path);
                outcome.skipped += 1;
                continue;
            }

            let content = match read_text(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                    outcome.skipped += 1;
                    continue;
                }
            };

            let language = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(detect_language);

            outcome.files.push(FileInfo {
                path: path.to_path_buf(),
                relative_path,
                language,
                content,
            });
        }

        tracing::info!(
            "Found {} files to index ({} skipped)",
            outcome.files.len(),
            outcome.skipped
        );
        Ok(outcome)
    }
}

/// Read a file as UTF-8 text, rejecting binary content.
fn read_text(path: &Path) -> Result<String, ScoutError> {
    let bytes = fs::read(path)?;

    if !is_probably_text(&bytes) {
        return Err(
            IndexingError::ContentUnreadable(path.display().to_string()).into(),
        );
    }

    String::from_utf8(bytes).map_err(|_| {
        IndexingError::ContentUnreadable(path.display().to_string()).into()
    })
}

/// Heuristic: more than 30% non-printable bytes means binary
fn is_probably_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    if bytes.contains(&0) {
        return false;
    }

    let non_printable = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    (non_printable as f64 / bytes.len() as f64) < 0.3
}
