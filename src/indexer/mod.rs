//! File walking and chunking
//!
//! The walker turns a codebase root into a sequence of readable files; the
//! chunker turns each file into an ordered cover of overlapping line slices.

pub mod chunker;
pub mod file_walker;
pub mod filters;
pub mod language;

pub use chunker::Chunker;
pub use file_walker::{FileWalker, WalkOutcome};

use std::path::PathBuf;

/// A source file selected for indexing
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the indexed root, stored in payloads
    pub relative_path: String,
    /// Language tag derived from the extension
    pub language: Option<String>,
    /// Decoded UTF-8 content
    pub content: String,
}

/// A contiguous slice of a file's text, the unit of embedding
///
/// Chunks from one file form an ordered cover: consecutive chunks share
/// exactly the configured overlap in lines, and only the final chunk may be
/// shorter than the chunk size. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Path relative to the indexed root
    pub relative_path: String,
    /// Language tag inherited from the file
    pub language: Option<String>,
    /// Position of this chunk within its file, assigned before any dispatch
    pub sequence: usize,
    /// First line of the chunk, 1-based inclusive
    pub start_line: usize,
    /// Last line of the chunk, 1-based inclusive
    pub end_line: usize,
    /// Byte offset of the chunk start within the file
    pub byte_start: usize,
    /// Byte offset one past the chunk end within the file
    pub byte_end: usize,
    /// Raw chunk text
    pub text: String,
}
