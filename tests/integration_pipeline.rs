#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for the build pipeline and retrieval, backed by a mock
// embedding server so no local model server is needed.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use notes_rag::config::{Config, OllamaConfig};
use notes_rag::embeddings::OllamaClient;
use notes_rag::embeddings::chunking::load_chunks;
use notes_rag::generation::save_response;
use notes_rag::index::FlatIndex;
use notes_rag::indexer::Indexer;
use notes_rag::retriever::Retriever;
use notes_rag::store::MetadataStore;

const TEST_DIMENSION: usize = 8;

/// Deterministic stand-in for a real embedding model: identical text maps
/// to identical vectors, so exact-match queries come back at distance zero.
fn fake_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; TEST_DIMENSION];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % TEST_DIMENSION] += f32::from(byte) / 255.0;
    }
    vector
}

struct EmbedResponder;

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body is JSON");

        if let Some(inputs) = body.get("input").and_then(|v| v.as_array()) {
            let embeddings: Vec<Vec<f32>> = inputs
                .iter()
                .map(|text| fake_embedding(text.as_str().unwrap_or_default()))
                .collect();
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embeddings": embeddings }))
        } else {
            let prompt = body.get("prompt").and_then(|v| v.as_str()).unwrap_or_default();
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embedding": fake_embedding(prompt) }))
        }
    }
}

async fn start_embed_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder)
        .mount(&server)
        .await;
    server
}

fn test_config(base_dir: &Path, server: &MockServer) -> Config {
    let mut config = Config::load(base_dir).expect("can load default config");
    config.ollama = OllamaConfig {
        protocol: "http".to_string(),
        host: server.address().ip().to_string(),
        port: server.address().port(),
        batch_size: 2,
        embedding_dimension: TEST_DIMENSION as u32,
        ..OllamaConfig::default()
    };
    config
}

fn write_notes_csv(config: &Config, rows: &[(&str, &str)]) {
    let csv_path = config.notes_csv_path();
    fs::create_dir_all(csv_path.parent().expect("csv path has a parent"))
        .expect("can create data dir");
    let mut lines = vec!["text,created_at,modified_at".to_string()];
    lines.extend(rows.iter().map(|(text, created_at)| format!("{text},{created_at},")));
    fs::write(&csv_path, lines.join("\n")).expect("can write notes csv");
}

#[tokio::test(flavor = "multi_thread")]
async fn build_and_retrieve_end_to_end() {
    let server = start_embed_server().await;
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    let long_note = "a ".repeat(300);
    write_notes_csv(&config, &[(long_note.trim(), "1650000000000000"), ("short note", "")]);

    let stats = Indexer::new(config.clone())
        .expect("can create indexer")
        .build()
        .expect("build succeeds");

    assert_eq!(stats.notes, 2);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.embedded, 3);
    assert_eq!(stats.dimension, TEST_DIMENSION);

    // The persisted chunk list carries the global ids in order.
    let chunks = load_chunks(&config.chunk_list_path()).expect("can load chunk list");
    assert_eq!(
        chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(chunks[2].text, "short note");

    // Index and metadata agree slot-by-slot with the chunk list.
    let report = Indexer::verify_consistency(&config).expect("can verify consistency");
    assert!(report.is_consistent(), "issues: {:?}", report.issues);

    // Exact-match retrieval surfaces the right chunk at distance zero.
    let retriever = Retriever::open(&config).expect("can open retriever");
    let results = retriever.retrieve("short note", 1).expect("can retrieve");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "short note");
    assert_eq!(results[0].chunk_id, 2);
    assert_eq!(results[0].original_index, 1);
    assert!(results[0].distance.abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn retrieval_results_are_sorted_and_clamped() {
    let server = start_embed_server().await;
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    write_notes_csv(
        &config,
        &[("alpha note", ""), ("beta note", ""), ("gamma note", "")],
    );
    Indexer::new(config.clone())
        .expect("can create indexer")
        .build()
        .expect("build succeeds");

    let retriever = Retriever::open(&config).expect("can open retriever");

    // top_k larger than the corpus is clamped, not an error.
    let results = retriever.retrieve("alpha note", 50).expect("can retrieve");
    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    assert_eq!(results[0].text, "alpha note");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_metadata_slot_degrades_gracefully() {
    let server = start_embed_server().await;
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    write_notes_csv(&config, &[("one", ""), ("two", ""), ("three", "")]);
    Indexer::new(config.clone())
        .expect("can create indexer")
        .build()
        .expect("build succeeds");

    // Drop one slot from the persisted metadata document.
    let raw = fs::read_to_string(config.metadata_path()).expect("can read metadata");
    let mut document: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw).expect("valid json");
    document.remove("1");
    fs::write(
        config.metadata_path(),
        serde_json::to_string(&document).expect("can serialize"),
    )
    .expect("can write metadata");

    let retriever = Retriever::open(&config).expect("can open retriever");
    let results = retriever.retrieve("one", 3).expect("partial miss is not fatal");

    // The hit for the removed slot is skipped, the rest come through.
    assert_eq!(results.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_corpus_builds_and_retrieves_empty() {
    let server = start_embed_server().await;
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    // Only blank rows: everything is dropped at ingestion.
    write_notes_csv(&config, &[("   ", ""), ("", "")]);
    let stats = Indexer::new(config.clone())
        .expect("can create indexer")
        .build()
        .expect("build succeeds");
    assert_eq!(stats.chunks, 0);

    let retriever = Retriever::open(&config).expect("can open retriever");
    assert!(retriever.is_empty());

    let results = retriever.retrieve("anything", 5).expect("can retrieve");
    assert!(results.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn persisted_index_roundtrips_search_results() {
    let server = start_embed_server().await;
    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    write_notes_csv(&config, &[("first", ""), ("second", ""), ("third", "")]);
    Indexer::new(config.clone())
        .expect("can create indexer")
        .build()
        .expect("build succeeds");

    let index = FlatIndex::load(&config.index_path()).expect("can load index");
    let metadata = MetadataStore::load(&config.metadata_path()).expect("can load metadata");
    assert_eq!(index.len(), metadata.len());

    let query = fake_embedding("second");
    let hits = index.search(&query, 3).expect("can search");
    assert_eq!(hits[0].1, 0.0);
    assert_eq!(
        metadata.lookup(hits[0].0).expect("record exists").text,
        "second"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn generation_roundtrip_with_mock_server() {
    let server = start_embed_server().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "response": "a generated answer" })),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("can create temp dir");
    let config = test_config(dir.path(), &server);

    let client = OllamaClient::new(&config.ollama).expect("can create client");
    let response = client.generate("any prompt").expect("generation succeeds");
    assert_eq!(response, "a generated answer");

    let saved = save_response(&config.responses_dir(), "my question", &response)
        .expect("can save response");
    let content = fs::read_to_string(&saved).expect("can read saved response");
    assert!(content.contains("my question"));
    assert!(content.contains("a generated answer"));
}
