
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::RagError;
use crate::embeddings::chunking::Chunk;

/// Provenance fields for the chunk whose embedding occupies a given index
/// slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub chunk_id: u64,
    pub text: String,
    pub original_index: usize,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
}

/// Slot-keyed store mapping index positions back to chunk text and
/// provenance.
///
/// Must be built from the exact chunk sequence, in the exact order, that
/// was embedded into the vector index; the slot number is the only join
/// key between the two.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataStore {
    records: BTreeMap<usize, MetadataRecord>,
}

impl MetadataStore {
    /// Build the store from an ordered chunk sequence; slot `i` maps to
    /// `chunks[i]`.
    #[inline]
    pub fn build(chunks: &[Chunk]) -> Self {
        let records = chunks
            .iter()
            .enumerate()
            .map(|(slot, chunk)| {
                (
                    slot,
                    MetadataRecord {
                        chunk_id: chunk.chunk_id,
                        text: chunk.text.clone(),
                        original_index: chunk.original_index,
                        created_at: chunk.created_at,
                        modified_at: chunk.modified_at,
                    },
                )
            })
            .collect();
        Self { records }
    }

    #[inline]
    pub fn lookup(&self, slot: usize) -> Option<&MetadataRecord> {
        self.records.get(&slot)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist as a JSON object keyed by stringified slot index.
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let by_key: BTreeMap<String, &MetadataRecord> = self
            .records
            .iter()
            .map(|(slot, record)| (slot.to_string(), record))
            .collect();
        let json =
            serde_json::to_string_pretty(&by_key).context("Failed to serialize metadata store")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write metadata store: {}", path.display()))?;

        debug!("Saved {} metadata records to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a store previously written by [`MetadataStore::save`].
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::Metadata(format!(
                "Metadata store not found: {}. Run the build command first.",
                path.display()
            ))
            .into());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata store: {}", path.display()))?;
        let by_key: BTreeMap<String, MetadataRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metadata store: {}", path.display()))?;

        let mut records = BTreeMap::new();
        for (key, record) in by_key {
            let slot: usize = key.parse().map_err(|_| {
                RagError::Metadata(format!(
                    "Invalid slot key '{}' in metadata store {}",
                    key,
                    path.display()
                ))
            })?;
            records.insert(slot, record);
        }

        debug!(
            "Loaded {} metadata records from {}",
            records.len(),
            path.display()
        );
        Ok(Self { records })
    }
}
