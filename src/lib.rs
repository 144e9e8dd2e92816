//! rag-bench - compare LLM configurations with and without retrieval.
//!
//! Answers the same questions with several local models (served by Ollama),
//! some grounded on chunks retrieved from a document corpus and some
//! answering from their own knowledge as controls, and records timed,
//! sourced responses for side-by-side evaluation.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_bench::{
//!     benchmark::Harness,
//!     chunker::split_documents,
//!     config::Config,
//!     document::load_corpus,
//!     embeddings::EmbeddingModel,
//!     export::save_report,
//!     index::EmbeddingIndex,
//!     llm::OllamaClient,
//!     responder::RagResponder,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     // Build the index once; later runs load the snapshot
//!     let embedder = EmbeddingModel::load(&config.index.embedding_model)?;
//!     let (index, _) = EmbeddingIndex::load_or_build(&config.index.path, false, &embedder, || {
//!         let corpus = load_corpus(&config.corpus.dir, &config.corpus.extensions)?;
//!         Ok(split_documents(&corpus.documents, &config.chunking))
//!     })?;
//!
//!     let backend = OllamaClient::new(config.backend.clone())?;
//!     let rag = RagResponder::new(&index, &embedder, config.index.top_k);
//!     let harness = Harness::new(&backend, Some(rag), &config.models, &config.personas);
//!
//!     let questions = vec!["O que muda com o MLO no Wi-Fi 7?".to_string()];
//!     let report = harness.compare_session(questions).await;
//!     report.print_summary();
//!     save_report(&report, &config.benchmark.output_dir)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **document**: corpus directory to page-tagged documents
//! - **chunker**: documents to overlapping chunks
//! - **embeddings** / **index**: vector index over chunks, persisted by **persistence**
//! - **llm**: Ollama backend, personas and prompts
//! - **responder**: RAG and control answers
//! - **benchmark**: comparative and batch runs, exported by **export**

pub mod benchmark;
pub mod chunker;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod export;
pub mod index;
pub mod llm;
pub mod persistence;
pub mod questions;
pub mod responder;

// Re-export commonly used types
pub use benchmark::{BenchmarkReport, Harness, QueryResult, Truncation};
pub use chunker::{Chunk, ChunkConfig};
pub use config::{Config, ModelConfig};
pub use document::Document;
pub use error::{RagError, Result};
pub use index::{EmbeddingIndex, IndexOrigin, SearchHit};
pub use llm::{Backend, ModelAdapter, OllamaClient};
pub use responder::{Answer, ControlResponder, RagResponder};
