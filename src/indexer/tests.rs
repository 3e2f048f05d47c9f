use super::*;
use crate::config::{OllamaConfig, RetrievalConfig};
use crate::embeddings::chunking::ChunkingParams;
use crate::ingest::Note;
use tempfile::TempDir;

fn test_config(base_dir: &std::path::Path) -> Config {
    Config {
        ollama: OllamaConfig::default(),
        chunking: ChunkingParams::default(),
        retrieval: RetrievalConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

fn write_artifacts(config: &Config) -> Vec<Chunk> {
    let notes = vec![
        Note {
            original_index: 0,
            text: "first note".to_string(),
            created_at: None,
            modified_at: None,
        },
        Note {
            original_index: 1,
            text: "second note".to_string(),
            created_at: None,
            modified_at: None,
        },
    ];
    let chunks = chunk_notes(&notes, &config.chunking).expect("can chunk");
    save_chunks(&chunks, &config.chunk_list_path()).expect("can save chunks");

    let mut index = FlatIndex::new(4).expect("can create index");
    index
        .add_batch(&vec![vec![0.0f32; 4]; chunks.len()])
        .expect("can add vectors");
    index.save(&config.index_path()).expect("can save index");

    MetadataStore::build(&chunks)
        .save(&config.metadata_path())
        .expect("can save metadata");

    chunks
}

#[test]
fn consistent_artifacts_report_clean() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());
    let chunks = write_artifacts(&config);

    let report = Indexer::verify_consistency(&config).expect("can verify");

    assert!(report.is_consistent());
    assert_eq!(report.chunk_count, chunks.len());
    assert_eq!(report.index_count, chunks.len());
    assert_eq!(report.metadata_count, chunks.len());
}

#[test]
fn missing_artifact_fails_verification() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());

    assert!(Indexer::verify_consistency(&config).is_err());
}

#[test]
fn count_mismatch_is_reported() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());
    let chunks = write_artifacts(&config);

    // Rewrite the index with one extra vector.
    let mut index = FlatIndex::new(4).expect("can create index");
    index
        .add_batch(&vec![vec![0.0f32; 4]; chunks.len() + 1])
        .expect("can add vectors");
    index.save(&config.index_path()).expect("can save index");

    let report = Indexer::verify_consistency(&config).expect("can verify");

    assert!(!report.is_consistent());
    assert!(report.issues[0].contains("vectors"));
}

#[test]
fn chunk_id_mismatch_is_reported() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path());
    let mut chunks = write_artifacts(&config);

    // Metadata rebuilt from a reordered chunk set simulates a stale pair.
    chunks.reverse();
    MetadataStore::build(&chunks)
        .save(&config.metadata_path())
        .expect("can save metadata");

    let report = Indexer::verify_consistency(&config).expect("can verify");

    assert!(!report.is_consistent());
    assert!(report.issues.iter().any(|issue| issue.contains("chunk_id")));
}
