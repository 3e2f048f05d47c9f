// Indexer module
// Runs the batch build pipeline: notes -> chunks -> embeddings -> index + metadata

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::chunking::{Chunk, chunk_notes, load_chunks, save_chunks};
use crate::embeddings::ollama::OllamaClient;
use crate::index::FlatIndex;
use crate::ingest::load_notes;
use crate::store::MetadataStore;

/// Counts reported after a successful build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub notes: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub dimension: usize,
}

/// Result of comparing the persisted artifacts against each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub chunk_count: usize,
    pub index_count: usize,
    pub metadata_count: usize,
    pub issues: Vec<String>,
}

impl ConsistencyReport {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Batch builder for the index/metadata pair.
///
/// The stages run strictly in sequence, each consuming the previous
/// stage's complete output. The chunk order established here is the slot
/// order of both persisted artifacts; they are always written together.
pub struct Indexer {
    config: Config,
    client: OllamaClient,
}

impl Indexer {
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let client = OllamaClient::new(&config.ollama)
            .context("Failed to initialize model server client")?;
        Ok(Self { config, client })
    }

    /// Run the full build pipeline and persist all artifacts.
    #[inline]
    pub fn build(&self) -> Result<BuildStats> {
        let notes = load_notes(&self.config.notes_csv_path())?;

        info!("Chunking {} notes", notes.len());
        let chunks = chunk_notes(&notes, &self.config.chunking)?;
        save_chunks(&chunks, &self.config.chunk_list_path())?;

        let embeddings = self.embed_chunks(&chunks)?;

        let dimension = self.client.embedding_dimension();
        let mut index = FlatIndex::new(dimension)?;
        index.add_batch(&embeddings)?;
        index.save(&self.config.index_path())?;

        // Built from the same chunk slice, in the same order, as the index.
        let metadata = MetadataStore::build(&chunks);
        metadata.save(&self.config.metadata_path())?;

        info!(
            "Build complete: {} notes, {} chunks, {} vectors of dimension {}",
            notes.len(),
            chunks.len(),
            index.len(),
            dimension
        );
        Ok(BuildStats {
            notes: notes.len(),
            chunks: chunks.len(),
            embedded: embeddings.len(),
            dimension,
        })
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let progress = ProgressBar::new(texts.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message("Embedding chunks");

        let batch_size = self.config.ollama.batch_size as usize;
        let mut embeddings = Vec::with_capacity(texts.len());
        for window in texts.chunks(batch_size) {
            let batch = self.client.embed_batch(window)?;
            progress.inc(window.len() as u64);
            embeddings.extend(batch);
        }
        progress.finish_and_clear();

        Ok(embeddings)
    }

    /// Cross-check the persisted chunk list, index, and metadata store.
    ///
    /// Detects the silent-corruption case where the artifacts were built
    /// from different chunk sets: counts must agree and every slot's
    /// metadata `chunk_id` must match the chunk list.
    #[inline]
    pub fn verify_consistency(config: &Config) -> Result<ConsistencyReport> {
        let chunks = load_chunks(&config.chunk_list_path())?;
        let index = FlatIndex::load(&config.index_path())?;
        let metadata = MetadataStore::load(&config.metadata_path())?;

        let mut issues = Vec::new();
        if index.len() != chunks.len() {
            issues.push(format!(
                "Index holds {} vectors but the chunk list has {} chunks",
                index.len(),
                chunks.len()
            ));
        }
        if metadata.len() != chunks.len() {
            issues.push(format!(
                "Metadata store holds {} records but the chunk list has {} chunks",
                metadata.len(),
                chunks.len()
            ));
        }
        for (slot, chunk) in chunks.iter().enumerate() {
            match metadata.lookup(slot) {
                Some(record) if record.chunk_id == chunk.chunk_id => {}
                Some(record) => issues.push(format!(
                    "Slot {} maps to chunk_id {} but the chunk list has chunk_id {}",
                    slot, record.chunk_id, chunk.chunk_id
                )),
                None => issues.push(format!("Slot {} has no metadata record", slot)),
            }
        }

        if !issues.is_empty() {
            warn!("Artifact consistency check found {} issue(s)", issues.len());
        }

        Ok(ConsistencyReport {
            chunk_count: chunks.len(),
            index_count: index.len(),
            metadata_count: metadata.len(),
            issues,
        })
    }
}
