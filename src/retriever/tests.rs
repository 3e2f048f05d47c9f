use super::*;
use crate::config::OllamaConfig;
use crate::embeddings::chunking::ChunkingParams;
use tempfile::TempDir;

fn test_config(base_dir: &std::path::Path) -> Config {
    Config {
        ollama: OllamaConfig::default(),
        chunking: ChunkingParams::default(),
        retrieval: crate::config::RetrievalConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

#[test]
fn open_fails_without_index() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());

    let err = Retriever::open(&config).expect_err("must fail without artifacts");
    assert!(err.to_string().contains("Vector index not found"));
}

#[test]
fn open_fails_without_metadata() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());

    // Index present, metadata missing: still a construction-time error.
    let index = FlatIndex::new(4).expect("can create index");
    index.save(&config.index_path()).expect("can save index");

    let err = Retriever::open(&config).expect_err("must fail without metadata");
    assert!(err.to_string().contains("Metadata store not found"));
}

#[test]
fn zero_top_k_is_rejected() {
    let client = OllamaClient::new(&OllamaConfig::default()).expect("can create client");
    let retriever = Retriever::from_parts(
        FlatIndex::new(4).expect("can create index"),
        MetadataStore::default(),
        client,
    );

    let err = retriever.retrieve("query", 0).expect_err("must reject top_k == 0");
    assert!(err.to_string().contains("top_k"));
}

#[test]
fn empty_corpus_returns_empty_without_embedding() {
    // The client points at a default localhost config; an empty index must
    // short-circuit before any network call is attempted.
    let client = OllamaClient::new(&OllamaConfig::default()).expect("can create client");
    let retriever = Retriever::from_parts(
        FlatIndex::new(4).expect("can create index"),
        MetadataStore::default(),
        client,
    );

    let results = retriever.retrieve("anything", 5).expect("empty corpus is not an error");
    assert!(results.is_empty());
}
