use super::{Chunk, FileInfo};

/// Sliding-window line chunker
///
/// Splits on line boundaries so results stay human-readable. Deterministic:
/// identical input always yields an identical sequence.
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `chunk_size > overlap` is enforced by config validation before a
    /// chunker is ever built.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        debug_assert!(chunk_size > overlap);
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Chunk a file into an ordered cover of overlapping line slices.
    ///
    /// Empty files produce zero chunks. `text` is always `\n`-joined; byte
    /// offsets address the original file content, so for `\r\n` files the
    /// offset range keeps interior `\r` bytes and stops before a trailing one.
    pub fn chunk_file(&self, file: &FileInfo) -> Vec<Chunk> {
        let lines: Vec<&str> = file.content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        // Byte offset of each line start, for stable chunk offsets
        let mut line_offsets = Vec::with_capacity(lines.len());
        let mut offset = 0usize;
        for line in file.content.split_inclusive('\n') {
            line_offsets.push(offset);
            offset += line.len();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start_idx = 0usize;
        let mut sequence = 0usize;

        loop {
            let end_idx = (start_idx + self.chunk_size).min(lines.len());
            let chunk_lines = &lines[start_idx..end_idx];
            let byte_start = line_offsets[start_idx];
            let last_line = lines[end_idx - 1];
            let byte_end = line_offsets[end_idx - 1] + last_line.len();

            chunks.push(Chunk {
                relative_path: file.relative_path.clone(),
                language: file.language.clone(),
                sequence,
                start_line: start_idx + 1,
                end_line: end_idx,
                byte_start,
                byte_end,
                text: chunk_lines.join("\n"),
            });

            if end_idx >= lines.len() {
                break;
            }
            start_idx += step;
            sequence += 1;
        }

        chunks
    }
}
