// Embeddings module
// Chunking of note text and the client for the embedding/generation server

pub mod chunking;
pub mod ollama;

pub use chunking::{Chunk, ChunkingParams, chunk_notes, chunk_text, load_chunks, save_chunks};
pub use ollama::OllamaClient;
