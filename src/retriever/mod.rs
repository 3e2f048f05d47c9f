#[cfg(test)]
mod tests;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::RagError;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::FlatIndex;
use crate::store::MetadataStore;

/// A chunk returned from retrieval, with its squared L2 distance to the
/// query embedding. Distances are exposed raw, without normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub chunk_id: u64,
    pub original_index: usize,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub distance: f32,
}

/// Semantic search over the persisted index/metadata pair.
///
/// Both artifacts are loaded at construction and treated as immutable for
/// the lifetime of the retriever.
#[derive(Debug)]
pub struct Retriever {
    index: FlatIndex,
    metadata: MetadataStore,
    client: OllamaClient,
}

impl Retriever {
    /// Load the index and metadata store from the configured paths.
    ///
    /// Both files must exist; a missing artifact is a construction-time
    /// error, never silently defaulted.
    #[inline]
    pub fn open(config: &Config) -> Result<Self> {
        let index = FlatIndex::load(&config.index_path())?;
        let metadata = MetadataStore::load(&config.metadata_path())?;
        let client = OllamaClient::new(&config.ollama)?;

        info!("Retriever initialized with {} vectors", index.len());
        Ok(Self::from_parts(index, metadata, client))
    }

    #[inline]
    pub fn from_parts(index: FlatIndex, metadata: MetadataStore, client: OllamaClient) -> Self {
        Self {
            index,
            metadata,
            client,
        }
    }

    /// Number of vectors available for search
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Retrieve the `top_k` chunks nearest to `query`, best match first.
    ///
    /// An empty corpus yields an empty result, not an error. A search hit
    /// whose slot has no metadata record is dropped with a warning;
    /// retrieval continues with the remaining hits.
    #[inline]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(
                RagError::Config("top_k must be greater than zero".to_string()).into(),
            );
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.client.embed_query(query)?;
        let hits = self.index.search(&embedding, top_k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (slot, distance) in hits {
            match self.metadata.lookup(slot) {
                Some(record) => results.push(RetrievedChunk {
                    text: record.text.clone(),
                    chunk_id: record.chunk_id,
                    original_index: record.original_index,
                    created_at: record.created_at,
                    modified_at: record.modified_at,
                    distance,
                }),
                None => {
                    warn!("No metadata record for slot {}, skipping result", slot);
                }
            }
        }

        Ok(results)
    }
}
