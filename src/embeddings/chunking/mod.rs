
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::RagError;
use crate::ingest::Note;

/// Parameters for fixed-window chunking with overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingParams {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks of the same note
    pub overlap: usize,
}

impl Default for ChunkingParams {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
        }
    }
}

impl ChunkingParams {
    /// Reject parameter combinations that cannot make forward progress.
    #[inline]
    pub fn ensure_valid(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Chunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Chunking(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A bounded piece of a note's normalized text, the atomic unit of
/// embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id, monotonically assigned across the whole corpus
    /// in chunking order
    pub chunk_id: u64,
    /// Index of the owning note in the source collection
    pub original_index: usize,
    /// 0-based position among the chunks of the same note
    pub chunk_index: usize,
    pub text: String,
    /// Number of chunks produced from the same note
    pub total_chunks: usize,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
}

/// Split text into overlapping fixed-size windows.
///
/// Texts no longer than `chunk_size` come back as a single chunk. Windows
/// are measured in characters, so multi-byte text never splits inside a
/// code point. Each window after the first repeats the last `overlap`
/// characters of its predecessor; the final window is clipped at the end
/// of the text.
#[inline]
pub fn chunk_text(text: &str, params: &ChunkingParams) -> Result<Vec<String>> {
    params.ensure_valid()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= params.chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let step = params.chunk_size - params.overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + params.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }

    Ok(chunks)
}

/// Chunk a batch of notes, assigning `chunk_id` from a single counter that
/// increases across all notes in processing order.
#[inline]
pub fn chunk_notes(notes: &[Note], params: &ChunkingParams) -> Result<Vec<Chunk>> {
    params.ensure_valid()?;

    let mut chunks = Vec::new();
    let mut next_chunk_id = 0u64;
    for note in notes {
        let pieces = chunk_text(&note.text, params)?;
        let total_chunks = pieces.len();
        for (chunk_index, text) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                chunk_id: next_chunk_id,
                original_index: note.original_index,
                chunk_index,
                text,
                total_chunks,
                created_at: note.created_at,
                modified_at: note.modified_at,
            });
            next_chunk_id += 1;
        }
    }

    debug!("Created {} chunks from {} notes", chunks.len(), notes.len());
    Ok(chunks)
}

/// Persist the chunk list as a JSON array.
#[inline]
pub fn save_chunks(chunks: &[Chunk], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(chunks).context("Failed to serialize chunk list")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write chunk list: {}", path.display()))?;
    Ok(())
}

/// Load a previously persisted chunk list.
#[inline]
pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    if !path.exists() {
        return Err(RagError::Chunking(format!(
            "Chunk list not found: {}. Run the build command first.",
            path.display()
        ))
        .into());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read chunk list: {}", path.display()))?;
    let chunks = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse chunk list: {}", path.display()))?;
    Ok(chunks)
}
